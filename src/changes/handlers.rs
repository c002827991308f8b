//! Per-kind change handlers.
//!
//! Each handler resolves its placeholders against the results of earlier
//! changes, issues the control-plane calls for its change, logs one progress
//! line and returns the value later changes will see through `$<id>`.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::api::{
    AddMachineArgs, AddUnitArgs, ControlPlaneClient, DeploymentLogger, ServiceDeployArgs,
};
use crate::charm::CharmUrl;
use crate::error::{ControlPlaneError, DeployError};

use super::change::{
    AddCharmParams, AddMachineParams, AddRelationParams, AddServiceParams, AddUnitParams,
    ChangeParams, SetAnnotationsParams,
};
use super::idempotency::{reconcile_existing_service, reusable_machine, reusable_unit};
use super::placeholder::{Endpoint, Placeholder, ResultTable};
use super::report::Outcome;

/// Result of a successful handler.
#[derive(Debug)]
pub(crate) struct Applied {
    pub(crate) result: String,
    pub(crate) outcome: Outcome,
}

/// State of one run: the client, the logger and what has been produced so far.
pub(crate) struct RunContext<'a> {
    client: &'a dyn ControlPlaneClient,
    log: &'a dyn DeploymentLogger,
    results: ResultTable,
    claimed_machines: HashSet<String>,
    claimed_units: HashSet<String>,
}

impl Applied {
    fn new(result: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            result: result.into(),
            outcome,
        }
    }
}

impl<'a> RunContext<'a> {
    pub(crate) fn new(client: &'a dyn ControlPlaneClient, log: &'a dyn DeploymentLogger) -> Self {
        Self {
            client,
            log,
            results: ResultTable::new(),
            claimed_machines: HashSet::new(),
            claimed_units: HashSet::new(),
        }
    }

    pub(crate) fn results_mut(&mut self) -> &mut ResultTable {
        &mut self.results
    }

    pub(crate) fn into_results(self) -> ResultTable {
        self.results
    }

    /// Applies one change.
    pub(crate) async fn apply(&mut self, id: &str, params: &ChangeParams) -> Result<Applied, DeployError> {
        match params {
            ChangeParams::AddCharm(p) => self.add_charm(p).await,
            ChangeParams::AddMachine(p) => self.add_machine(p).await,
            ChangeParams::AddService(p) => self.add_service(p).await,
            ChangeParams::AddUnit(p) => self.add_unit(p).await,
            ChangeParams::AddRelation(p) => self.add_relation(p).await,
            ChangeParams::SetAnnotations(p) => self.set_annotations(p).await,
            // Rejected by the executor before dispatch; kept for direct callers.
            ChangeParams::Unsupported { method, .. } => Err(DeployError::UnknownChangeKind {
                id: id.to_string(),
                method: method.clone(),
            }),
        }
    }

    /// Resolves a placeholder that must refer to a produced, non-empty result.
    fn require(&self, placeholder: &Placeholder) -> Result<String, DeployError> {
        let value = self.results.resolve(placeholder);
        if value.is_empty() {
            return Err(DeployError::UnresolvedPlaceholder {
                placeholder: placeholder.to_string(),
            });
        }
        Ok(value.to_string())
    }

    fn require_endpoint(&self, endpoint: &Endpoint) -> Result<String, DeployError> {
        self.require(endpoint.service())?;
        Ok(self.results.resolve_endpoint(endpoint))
    }

    async fn add_charm(&self, p: &AddCharmParams) -> Result<Applied, DeployError> {
        let url = CharmUrl::parse(&p.charm).map_err(|e| DeployError::InvalidCharmUrl {
            url: p.charm.clone(),
            message: e.to_string(),
        })?;
        if url.is_bundle() {
            return Err(DeployError::UnexpectedBundleUrl {
                url: p.charm.clone(),
            });
        }

        let added = self
            .client
            .add_charm(&url)
            .await
            .map_err(|e| DeployError::operation(format!("cannot add charm {:?}", p.charm), e))?;

        self.log.info(&format!("added charm {added}"));
        Ok(Applied::new(added.to_string(), Outcome::Added))
    }

    async fn add_service(&self, p: &AddServiceParams) -> Result<Applied, DeployError> {
        let charm = self.require(&p.charm)?;
        let args = ServiceDeployArgs::new(&p.service, &charm).with_constraints(&p.constraints);

        let outcome = match self.client.deploy_service(&args).await {
            Ok(()) => {
                self.log
                    .info(&format!("service {} deployed (charm: {charm})", p.service));
                Outcome::Deployed
            }
            Err(ControlPlaneError::ServiceAlreadyExists { .. }) => {
                debug!("Service {} already exists", p.service);
                reconcile_existing_service(self.client, self.log, &p.service, &charm).await?
            }
            Err(e) => {
                return Err(DeployError::operation(
                    format!("cannot deploy service {:?}", p.service),
                    e,
                ));
            }
        };

        if !p.options.is_empty() {
            let yaml = options_yaml(&p.service, &p.options)?;
            self.client
                .set_service_config(&p.service, &yaml)
                .await
                .map_err(|e| {
                    DeployError::operation(
                        format!("cannot set options for service {:?}", p.service),
                        e,
                    )
                })?;
            self.log.info(&format!("service {} configured", p.service));
        }

        Ok(Applied::new(p.service.clone(), outcome))
    }

    async fn add_relation(&self, p: &AddRelationParams) -> Result<Applied, DeployError> {
        let ep1 = self.require_endpoint(&p.endpoint1)?;
        let ep2 = self.require_endpoint(&p.endpoint2)?;

        let outcome = match self.client.add_relation(&ep1, &ep2).await {
            Ok(()) => {
                self.log.info(&format!("related {ep1} and {ep2}"));
                Outcome::Related
            }
            Err(ControlPlaneError::RelationAlreadyExists { .. }) => {
                self.log.info(&format!("{ep1} and {ep2} are already related"));
                Outcome::AlreadyRelated
            }
            Err(e) => {
                return Err(DeployError::operation(
                    format!("cannot add relation between {ep1:?} and {ep2:?}"),
                    e,
                ));
            }
        };

        Ok(Applied::new(String::new(), outcome))
    }

    async fn add_machine(&mut self, p: &AddMachineParams) -> Result<Applied, DeployError> {
        let parent_id = p
            .parent_id
            .as_ref()
            .map(|parent| self.require(parent))
            .transpose()?;
        let args = AddMachineArgs {
            series: p.series.clone(),
            constraints: p.constraints.clone(),
            container_type: p.container_type,
            parent_id,
        };

        let machines = self
            .client
            .list_machines()
            .await
            .map_err(|e| DeployError::operation("cannot list machines", e))?;

        if let Some(existing) = reusable_machine(&machines, &args, &self.claimed_machines) {
            let id = existing.id.clone();
            self.log.info(&format!("reusing machine {id}"));
            self.claimed_machines.insert(id.clone());
            return Ok(Applied::new(id, Outcome::Reused));
        }

        let id = self
            .client
            .add_machine(&args)
            .await
            .map_err(|e| DeployError::operation("cannot create machine", e))?;

        match (&args.container_type, &args.parent_id) {
            (Some(container), Some(parent)) => {
                self.log
                    .info(&format!("created {container} container {id} on machine {parent}"));
            }
            (Some(container), None) => {
                self.log.info(&format!("created {container} container {id}"));
            }
            _ => self.log.info(&format!("created new machine {id}")),
        }
        self.claimed_machines.insert(id.clone());
        Ok(Applied::new(id, Outcome::Provisioned))
    }

    async fn add_unit(&mut self, p: &AddUnitParams) -> Result<Applied, DeployError> {
        let service = self.require(&p.service)?;
        let machine = p.to.as_ref().map(|to| self.require(to)).transpose()?;

        let units = self.client.service_units(&service).await.map_err(|e| {
            DeployError::operation(format!("cannot list units of service {service:?}"), e)
        })?;

        if let Some(existing) = reusable_unit(&units, machine.as_deref(), &self.claimed_units) {
            let name = existing.name.clone();
            self.log.info(&format!("reusing unit {name}"));
            self.claimed_units.insert(name.clone());
            return Ok(Applied::new(name, Outcome::Reused));
        }

        let args = AddUnitArgs {
            service_name: service.clone(),
            to_machine_spec: machine.clone(),
        };
        let unit = self.client.add_unit(&args).await.map_err(|e| {
            DeployError::operation(format!("cannot add unit for service {service:?}"), e)
        })?;

        match machine {
            Some(machine) => self.log.info(&format!("added {unit} unit to machine {machine}")),
            None => self.log.info(&format!("added {unit} unit to new machine")),
        }
        self.claimed_units.insert(unit.clone());
        Ok(Applied::new(unit, Outcome::UnitAdded))
    }

    async fn set_annotations(&self, p: &SetAnnotationsParams) -> Result<Applied, DeployError> {
        let target = self.require(&p.id)?;

        self.client
            .set_annotations(p.entity_type, &target, &p.annotations)
            .await
            .map_err(|e| {
                DeployError::operation(
                    format!("cannot set annotations for {} {target:?}", p.entity_type),
                    e,
                )
            })?;

        self.log
            .info(&format!("annotations set for {} {target}", p.entity_type));
        Ok(Applied::new(String::new(), Outcome::Annotated))
    }
}

/// Encodes service options as the `{service: {option: value}}` YAML document
/// the control plane expects.
fn options_yaml(
    service: &str,
    options: &BTreeMap<String, serde_json::Value>,
) -> Result<String, DeployError> {
    let mut document = BTreeMap::new();
    document.insert(service, options);
    serde_yaml::to_string(&document).map_err(|e| DeployError::OptionsEncoding {
        service: service.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_yaml_nests_under_service() {
        let mut options = BTreeMap::new();
        options.insert(String::from("debug"), serde_json::json!(true));
        options.insert(String::from("engine"), serde_json::json!("nginx"));

        let yaml = options_yaml("wordpress", &options).unwrap();
        let parsed: BTreeMap<String, BTreeMap<String, serde_json::Value>> =
            serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed["wordpress"]["debug"], serde_json::json!(true));
        assert_eq!(parsed["wordpress"]["engine"], serde_json::json!("nginx"));
    }
}
