//! Shared test helpers: an in-memory control plane that records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use bundle_deploy::api::{
    AddMachineArgs, AddUnitArgs, ControlPlaneClient, EntityType, MachineInfo, ServiceDeployArgs,
    UnitInfo,
};
use bundle_deploy::changes::{Change, ChangeRecord};
use bundle_deploy::charm::CharmUrl;
use bundle_deploy::error::{ControlPlaneError, ControlPlaneResult};

/// One recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub ok: bool,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    charms: Vec<String>,
    services: BTreeMap<String, String>,
    configs: BTreeMap<String, String>,
    constraints: BTreeMap<String, String>,
    relations: BTreeSet<(String, String)>,
    machines: Vec<MachineInfo>,
    units: Vec<(String, UnitInfo)>,
    annotations: BTreeMap<String, BTreeMap<String, String>>,
    failures: HashMap<&'static str, ControlPlaneError>,
    next_machine: u32,
}

/// In-memory control plane keeping state across runs.
#[derive(Debug)]
pub struct FakeControlPlane {
    state: Mutex<State>,
}

impl FakeControlPlane {
    /// Creates a control plane with a single controller machine `0`.
    pub fn new() -> Self {
        let state = State {
            machines: vec![MachineInfo {
                id: String::from("0"),
                series: String::from("trusty"),
                constraints: String::new(),
                container_type: None,
                parent_id: None,
                controller: true,
            }],
            next_machine: 1,
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Pre-deploys a service.
    pub fn with_service(self, service: &str, charm: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .services
            .insert(service.to_string(), charm.to_string());
        self
    }

    /// Makes the next call of `method` fail with `error`.
    pub fn fail_next(&self, method: &'static str, error: ControlPlaneError) {
        self.state.lock().unwrap().failures.insert(method, error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.method).collect()
    }

    pub fn successful_calls(&self) -> usize {
        self.calls().iter().filter(|c| c.ok).count()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn service_charm(&self, service: &str) -> Option<String> {
        self.state.lock().unwrap().services.get(service).cloned()
    }

    pub fn service_config(&self, service: &str) -> Option<String> {
        self.state.lock().unwrap().configs.get(service).cloned()
    }

    pub fn service_constraints(&self, service: &str) -> Option<String> {
        self.state.lock().unwrap().constraints.get(service).cloned()
    }

    pub fn services(&self) -> Vec<String> {
        self.state.lock().unwrap().services.keys().cloned().collect()
    }

    pub fn relations(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().relations.iter().cloned().collect()
    }

    pub fn machines(&self) -> Vec<MachineInfo> {
        self.state.lock().unwrap().machines.clone()
    }

    pub fn units(&self) -> Vec<(String, UnitInfo)> {
        self.state.lock().unwrap().units.clone()
    }

    pub fn annotations(&self, tag: &str) -> Option<BTreeMap<String, String>> {
        self.state.lock().unwrap().annotations.get(tag).cloned()
    }

    /// Records a call, failing it if a failure was injected.
    fn begin(&self, method: &'static str) -> ControlPlaneResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.failures.remove(method) {
            state.calls.push(Call { method, ok: false });
            return Err(error);
        }
        state.calls.push(Call { method, ok: true });
        Ok(state)
    }

    fn fail_last(state: &mut State) {
        if let Some(call) = state.calls.last_mut() {
            call.ok = false;
        }
    }
}

#[async_trait]
impl ControlPlaneClient for FakeControlPlane {
    async fn add_charm(&self, url: &CharmUrl) -> ControlPlaneResult<CharmUrl> {
        let mut state = self.begin("add_charm")?;
        let resolved = url.with_revision(url.revision().or(Some(1)));
        state.charms.push(resolved.to_string());
        Ok(resolved)
    }

    async fn deploy_service(&self, args: &ServiceDeployArgs) -> ControlPlaneResult<()> {
        let mut state = self.begin("deploy_service")?;
        if state.services.contains_key(&args.service_name) {
            Self::fail_last(&mut state);
            return Err(ControlPlaneError::ServiceAlreadyExists {
                service: args.service_name.clone(),
            });
        }
        state
            .services
            .insert(args.service_name.clone(), args.charm_url.clone());
        state
            .constraints
            .insert(args.service_name.clone(), args.constraints.clone());
        Ok(())
    }

    async fn service_charm_url(&self, service: &str) -> ControlPlaneResult<CharmUrl> {
        let state = self.begin("service_charm_url")?;
        let charm = state
            .services
            .get(service)
            .ok_or_else(|| ControlPlaneError::NotFound {
                entity: format!("service {service}"),
            })?;
        CharmUrl::parse(charm).map_err(|e| ControlPlaneError::InvalidResponse {
            message: e.to_string(),
        })
    }

    async fn set_service_charm(
        &self,
        service: &str,
        url: &CharmUrl,
        _force_units: bool,
    ) -> ControlPlaneResult<()> {
        let mut state = self.begin("set_service_charm")?;
        state.services.insert(service.to_string(), url.to_string());
        Ok(())
    }

    async fn set_service_config(&self, service: &str, config_yaml: &str) -> ControlPlaneResult<()> {
        let mut state = self.begin("set_service_config")?;
        state
            .configs
            .insert(service.to_string(), config_yaml.to_string());
        Ok(())
    }

    async fn add_relation(&self, endpoint1: &str, endpoint2: &str) -> ControlPlaneResult<()> {
        let mut state = self.begin("add_relation")?;
        let key = if endpoint1 <= endpoint2 {
            (endpoint1.to_string(), endpoint2.to_string())
        } else {
            (endpoint2.to_string(), endpoint1.to_string())
        };
        if !state.relations.insert(key) {
            Self::fail_last(&mut state);
            return Err(ControlPlaneError::RelationAlreadyExists {
                endpoint1: endpoint1.to_string(),
                endpoint2: endpoint2.to_string(),
            });
        }
        Ok(())
    }

    async fn add_machine(&self, args: &AddMachineArgs) -> ControlPlaneResult<String> {
        let mut state = self.begin("add_machine")?;
        let n = state.next_machine;
        state.next_machine += 1;
        // A container without a parent lands on a fresh host numbered `n`.
        let (id, parent_id) = match (&args.container_type, &args.parent_id) {
            (Some(container), Some(parent)) => {
                (format!("{parent}/{container}/{n}"), Some(parent.clone()))
            }
            (Some(container), None) => (format!("{n}/{container}/0"), Some(n.to_string())),
            _ => (n.to_string(), None),
        };
        state.machines.push(MachineInfo {
            id: id.clone(),
            series: args.series.clone(),
            constraints: args.constraints.clone(),
            container_type: args.container_type,
            parent_id,
            controller: false,
        });
        Ok(id)
    }

    async fn list_machines(&self) -> ControlPlaneResult<Vec<MachineInfo>> {
        let state = self.begin("list_machines")?;
        Ok(state.machines.clone())
    }

    async fn add_unit(&self, args: &AddUnitArgs) -> ControlPlaneResult<String> {
        let mut state = self.begin("add_unit")?;
        let n = state
            .units
            .iter()
            .filter(|(service, _)| service == &args.service_name)
            .count();
        let name = format!("{}/{n}", args.service_name);
        let machine = match &args.to_machine_spec {
            Some(machine) => machine.clone(),
            None => {
                let id = state.next_machine.to_string();
                state.next_machine += 1;
                id
            }
        };
        state.units.push((
            args.service_name.clone(),
            UnitInfo {
                name: name.clone(),
                machine: Some(machine),
            },
        ));
        Ok(name)
    }

    async fn service_units(&self, service: &str) -> ControlPlaneResult<Vec<UnitInfo>> {
        let state = self.begin("service_units")?;
        Ok(state
            .units
            .iter()
            .filter(|(s, _)| s == service)
            .map(|(_, unit)| unit.clone())
            .collect())
    }

    async fn set_annotations(
        &self,
        entity: EntityType,
        id: &str,
        annotations: &BTreeMap<String, String>,
    ) -> ControlPlaneResult<()> {
        let mut state = self.begin("set_annotations")?;
        state
            .annotations
            .entry(entity.tag(id))
            .or_default()
            .extend(annotations.clone());
        Ok(())
    }
}

/// Builds changes from `(id, method, args)` triples.
pub fn changes(records: &[(&str, &str, serde_json::Value)]) -> Vec<Change> {
    records
        .iter()
        .map(|(id, method, args)| {
            Change::try_from(ChangeRecord {
                id: (*id).to_string(),
                method: (*method).to_string(),
                args: args.clone(),
                requires: vec![],
            })
            .unwrap()
        })
        .collect()
}
