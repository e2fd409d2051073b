//! In-process fake of the provider used by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use rightsizer_lib::adapter::{
    AutoscalingApi, ComputeApi, DatabaseApi, DbInstanceDescription, FunctionApi,
    FunctionConfiguration, GroupDescription, InstanceDescription, InstanceState,
    LaunchConfiguration, LaunchSource,
};
use rightsizer_lib::{ProviderError, RawRecommendation, RecommendationSource, ResourceKind, SizingValue};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct CloudState {
    pub source_down: bool,
    pub recommendations: HashMap<ResourceKind, Vec<RawRecommendation>>,
    pub instances: HashMap<String, InstanceDescription>,
    pub databases: HashMap<String, DbInstanceDescription>,
    pub groups: HashMap<String, GroupDescription>,
    pub launch_configurations: HashMap<String, LaunchConfiguration>,
    /// Latest version and instance type per launch template
    pub templates: HashMap<String, Vec<(u64, String)>>,
    pub functions: HashMap<String, FunctionConfiguration>,
    /// Every mutation call, in order
    pub mutations: Vec<String>,
}

/// Fake provider with mutable in-memory resources
#[derive(Default)]
pub struct FakeCloud {
    pub state: Mutex<CloudState>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recommend(&self, kind: ResourceKind, subject: &str, current: SizingValue, options: Vec<SizingValue>) {
        self.state
            .lock()
            .unwrap()
            .recommendations
            .entry(kind)
            .or_default()
            .push(RawRecommendation {
                subject: subject.to_string(),
                current_value: current,
                ranked_options: options,
            });
    }

    pub fn add_instance(&self, id: &str, instance_type: &str, state: InstanceState) {
        self.state.lock().unwrap().instances.insert(
            id.to_string(),
            InstanceDescription {
                instance_id: id.to_string(),
                instance_type: instance_type.to_string(),
                state,
            },
        );
    }

    pub fn add_database(&self, id: &str, instance_class: &str, status: &str) {
        self.state.lock().unwrap().databases.insert(
            id.to_string(),
            DbInstanceDescription {
                db_instance_id: id.to_string(),
                instance_class: instance_class.to_string(),
                status: status.to_string(),
            },
        );
    }

    pub fn add_template_group(&self, group: &str, template_id: &str, version: u64, instance_type: &str) {
        let mut state = self.state.lock().unwrap();
        state.groups.insert(
            group.to_string(),
            GroupDescription {
                group_name: group.to_string(),
                launch_source: Some(LaunchSource::LaunchTemplate {
                    launch_template_id: template_id.to_string(),
                    version: version.to_string(),
                }),
            },
        );
        state
            .templates
            .insert(template_id.to_string(), vec![(version, instance_type.to_string())]);
    }

    pub fn add_function(&self, name: &str, memory_mb: u32) {
        self.state.lock().unwrap().functions.insert(
            name.to_string(),
            FunctionConfiguration {
                function_name: name.to_string(),
                memory_mb,
            },
        );
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }
}

#[async_trait]
impl RecommendationSource for FakeCloud {
    async fn list_recommendations(
        &self,
        kind: ResourceKind,
    ) -> Result<Vec<RawRecommendation>, ProviderError> {
        let state = self.state.lock().unwrap();
        if state.source_down {
            return Err(ProviderError::Request("optimizer unreachable".to_string()));
        }
        Ok(state.recommendations.get(&kind).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ComputeApi for FakeCloud {
    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceDescription>, ProviderError> {
        Ok(self.state.lock().unwrap().instances.get(instance_id).cloned())
    }

    async fn modify_instance_type(
        &self,
        instance_id: &str,
        instance_type: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state
            .mutations
            .push(format!("modify_instance_type {} {}", instance_id, instance_type));
        match state.instances.get_mut(instance_id) {
            Some(instance) => {
                instance.instance_type = instance_type.to_string();
                Ok(())
            }
            None => Err(ProviderError::NotFound(instance_id.to_string())),
        }
    }
}

#[async_trait]
impl DatabaseApi for FakeCloud {
    async fn describe_db_instance(
        &self,
        db_instance_id: &str,
    ) -> Result<Option<DbInstanceDescription>, ProviderError> {
        Ok(self.state.lock().unwrap().databases.get(db_instance_id).cloned())
    }

    async fn modify_db_instance_class(
        &self,
        db_instance_id: &str,
        instance_class: &str,
        apply_immediately: bool,
    ) -> Result<(), ProviderError> {
        self.state.lock().unwrap().mutations.push(format!(
            "modify_db_instance_class {} {} apply_immediately={}",
            db_instance_id, instance_class, apply_immediately
        ));
        Ok(())
    }
}

#[async_trait]
impl AutoscalingApi for FakeCloud {
    async fn describe_group(
        &self,
        group_name: &str,
    ) -> Result<Option<GroupDescription>, ProviderError> {
        Ok(self.state.lock().unwrap().groups.get(group_name).cloned())
    }

    async fn create_launch_template_version(
        &self,
        launch_template_id: &str,
        source_version: &str,
        instance_type: &str,
    ) -> Result<u64, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push(format!(
            "create_launch_template_version {} from {} {}",
            launch_template_id, source_version, instance_type
        ));
        let versions = state
            .templates
            .get_mut(launch_template_id)
            .ok_or_else(|| ProviderError::NotFound(launch_template_id.to_string()))?;
        let next = versions.iter().map(|(v, _)| *v).max().unwrap_or(0) + 1;
        versions.push((next, instance_type.to_string()));
        Ok(next)
    }

    async fn describe_launch_configuration(
        &self,
        name: &str,
    ) -> Result<Option<LaunchConfiguration>, ProviderError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .launch_configurations
            .get(name)
            .cloned())
    }

    async fn create_launch_configuration(
        &self,
        configuration: &LaunchConfiguration,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state
            .mutations
            .push(format!("create_launch_configuration {}", configuration.name));
        state
            .launch_configurations
            .insert(configuration.name.clone(), configuration.clone());
        Ok(())
    }

    async fn update_group_launch_source(
        &self,
        group_name: &str,
        launch_source: &LaunchSource,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        let target = match launch_source {
            LaunchSource::LaunchTemplate {
                launch_template_id,
                version,
            } => format!("{}@{}", launch_template_id, version),
            LaunchSource::LaunchConfiguration { name } => name.clone(),
        };
        state
            .mutations
            .push(format!("update_group_launch_source {} {}", group_name, target));
        match state.groups.get_mut(group_name) {
            Some(group) => {
                group.launch_source = Some(launch_source.clone());
                Ok(())
            }
            None => Err(ProviderError::NotFound(group_name.to_string())),
        }
    }
}

#[async_trait]
impl FunctionApi for FakeCloud {
    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> Result<Option<FunctionConfiguration>, ProviderError> {
        Ok(self.state.lock().unwrap().functions.get(function_name).cloned())
    }

    async fn update_function_memory(
        &self,
        function_name: &str,
        memory_mb: u32,
    ) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state
            .mutations
            .push(format!("update_function_memory {} {}", function_name, memory_mb));
        match state.functions.get_mut(function_name) {
            Some(function) => {
                function.memory_mb = memory_mb;
                Ok(())
            }
            None => Err(ProviderError::NotFound(function_name.to_string())),
        }
    }
}
