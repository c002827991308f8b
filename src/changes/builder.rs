//! Change-graph builder.
//!
//! Turns a verified bundle into an ordered change list:
//!
//! 1. `addCharm` for each distinct charm,
//! 2. `deploy` for each service,
//! 3. `addMachines` for each declared machine, in numeric order,
//! 4. `addRelation` for each relation,
//! 5. `addUnit` for each unit, preceded by the `addMachines` its placement
//!    needs (containers and `new` machines),
//! 6. `setAnnotations` for annotated services and machines.
//!
//! Ids are `<method>-<n>` with `n` counting across the whole list, so every
//! change only refers to changes listed before it.

use std::collections::{BTreeMap, HashMap};

use crate::api::EntityType;
use crate::bundle::{BundleData, ContainerType, Placement};
use crate::charm::CharmUrl;

use super::change::{
    AddCharmParams, AddMachineParams, AddRelationParams, AddServiceParams, AddUnitParams,
    Change, ChangeKind, ChangeParams, SetAnnotationsParams,
};
use super::placeholder::{Endpoint, Placeholder};

/// Builds change lists from bundles.
#[derive(Debug, Default)]
pub struct ChangeBuilder {
    changes: Vec<Change>,
}

impl ChangeBuilder {
    /// Creates a new builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    /// Builds the change list for a bundle.
    ///
    /// The bundle should have been verified: entries that do not parse
    /// (placements, relation endpoints, services a relation names but the
    /// bundle does not declare) are skipped.
    #[must_use]
    pub fn build(mut self, bundle: &BundleData) -> Vec<Change> {
        let default_series = bundle.series.as_deref();

        let mut charm_changes: HashMap<String, String> = HashMap::new();
        let mut charm_series: HashMap<&str, String> = HashMap::new();
        for (name, service) in &bundle.services {
            let url = CharmUrl::parse_with_series(&service.charm, default_series);
            let charm = url
                .as_ref()
                .map_or_else(|_| service.charm.clone(), ToString::to_string);
            charm_series.insert(
                name.as_str(),
                url.map(|u| u.series().to_string()).unwrap_or_default(),
            );

            if !charm_changes.contains_key(&charm) {
                let id = self.push(
                    ChangeParams::AddCharm(AddCharmParams {
                        charm: charm.clone(),
                    }),
                    vec![],
                );
                charm_changes.insert(charm.clone(), id);
            }
        }

        let mut service_changes: HashMap<&str, String> = HashMap::new();
        for (name, service) in &bundle.services {
            let url = CharmUrl::parse_with_series(&service.charm, default_series)
                .map_or_else(|_| service.charm.clone(), |u| u.to_string());
            let Some(charm_id) = charm_changes.get(&url).cloned() else {
                continue;
            };

            let id = self.push(
                ChangeParams::AddService(AddServiceParams {
                    charm: Placeholder::for_change(&charm_id),
                    service: name.clone(),
                    options: service.options.clone(),
                    constraints: service.constraints.clone(),
                }),
                vec![charm_id],
            );
            service_changes.insert(name.as_str(), id);
        }

        let mut machine_ids: Vec<&String> = bundle.machines.keys().collect();
        machine_ids.sort_by_key(|id| (id.len(), id.as_str()));

        let mut machine_changes: HashMap<&str, String> = HashMap::new();
        for machine_id in machine_ids {
            let machine = &bundle.machines[machine_id];
            let id = self.push(
                ChangeParams::AddMachine(AddMachineParams {
                    series: bundle.machine_series(machine),
                    constraints: machine.constraints.clone(),
                    container_type: None,
                    parent_id: None,
                }),
                vec![],
            );
            machine_changes.insert(machine_id.as_str(), id);
        }

        for relation in &bundle.relations {
            let [ep1, ep2] = relation.as_slice() else {
                continue;
            };
            let (Some(endpoint1), Some(endpoint2)) = (
                relation_endpoint(ep1, &service_changes),
                relation_endpoint(ep2, &service_changes),
            ) else {
                continue;
            };

            let requires = vec![
                endpoint1.service().change_id().to_string(),
                endpoint2.service().change_id().to_string(),
            ];
            self.push(
                ChangeParams::AddRelation(AddRelationParams {
                    endpoint1,
                    endpoint2,
                }),
                requires,
            );
        }

        for (name, service) in &bundle.services {
            let Some(service_id) = service_changes.get(name.as_str()).cloned() else {
                continue;
            };
            let series = charm_series.get(name.as_str()).cloned().unwrap_or_default();

            for unit in 0..service.num_units as usize {
                let placement = service.to.get(unit).map(|p| Placement::parse(p));
                let machine_id = match placement {
                    None => None,
                    Some(Ok(Placement::Machine(machine))) => {
                        machine_changes.get(machine.as_str()).cloned()
                    }
                    Some(Ok(Placement::NewMachine)) => Some(self.push_machine(
                        &series,
                        &service.constraints,
                        None,
                        None,
                    )),
                    Some(Ok(Placement::Container {
                        container_type,
                        machine,
                    })) => {
                        let parent = machine
                            .as_deref()
                            .and_then(|m| machine_changes.get(m))
                            .cloned();
                        Some(self.push_machine(
                            &series,
                            &service.constraints,
                            Some(container_type),
                            parent,
                        ))
                    }
                    Some(Err(_)) => continue,
                };

                let mut requires = vec![service_id.clone()];
                requires.extend(machine_id.iter().cloned());
                self.push(
                    ChangeParams::AddUnit(AddUnitParams {
                        service: Placeholder::for_change(&service_id),
                        to: machine_id.map(Placeholder::for_change),
                    }),
                    requires,
                );
            }
        }

        for (name, service) in &bundle.services {
            if service.annotations.is_empty() {
                continue;
            }
            if let Some(service_id) = service_changes.get(name.as_str()).cloned() {
                self.push_annotations(EntityType::Service, service_id, &service.annotations);
            }
        }

        for (machine_id, machine) in &bundle.machines {
            if machine.annotations.is_empty() {
                continue;
            }
            if let Some(change_id) = machine_changes.get(machine_id.as_str()).cloned() {
                self.push_annotations(EntityType::Machine, change_id, &machine.annotations);
            }
        }

        self.changes
    }

    /// Appends a change and returns its id.
    fn push(&mut self, params: ChangeParams, requires: Vec<String>) -> String {
        let method = params.kind().map_or("change", ChangeKind::method);
        let id = format!("{method}-{}", self.changes.len());
        self.changes.push(Change::new(id.clone(), params, requires));
        id
    }

    fn push_machine(
        &mut self,
        series: &str,
        constraints: &str,
        container_type: Option<ContainerType>,
        parent: Option<String>,
    ) -> String {
        let requires = parent.iter().cloned().collect();
        self.push(
            ChangeParams::AddMachine(AddMachineParams {
                series: series.to_string(),
                constraints: constraints.to_string(),
                container_type,
                parent_id: parent.map(Placeholder::for_change),
            }),
            requires,
        )
    }

    fn push_annotations(
        &mut self,
        entity_type: EntityType,
        change_id: String,
        annotations: &BTreeMap<String, String>,
    ) {
        self.push(
            ChangeParams::SetAnnotations(SetAnnotationsParams {
                id: Placeholder::for_change(&change_id),
                entity_type,
                annotations: annotations.clone(),
            }),
            vec![change_id],
        );
    }
}

/// Builds the change list for a bundle.
#[must_use]
pub fn build_changes(bundle: &BundleData) -> Vec<Change> {
    ChangeBuilder::new().build(bundle)
}

/// Maps a bundle endpoint (`service[:relation]`) to a placeholder endpoint.
fn relation_endpoint(endpoint: &str, services: &HashMap<&str, String>) -> Option<Endpoint> {
    let (service, relation) = match endpoint.split_once(':') {
        Some((service, relation)) => (service, Some(relation.to_string())),
        None => (endpoint, None),
    };
    services
        .get(service)
        .map(|id| Endpoint::new(Placeholder::for_change(id), relation))
}
