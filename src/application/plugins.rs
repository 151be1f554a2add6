//! Declarative API-plugin loading and tool registration.
//!
//! Each subdirectory of the deployment's `plugins` folder holds one plugin
//! manifest describing the HTTP operations a model may call. Loading binds
//! every operation to an authenticated caller (a fresh on-behalf-of token
//! per outbound call) and applies the configured schema filter to the one
//! operation/parameter pair whose schema is too noisy for strict mode.
//!
//! Loading is all-or-nothing: the first plugin that fails aborts the whole
//! load, so a request never runs against a partial tool set.

use crate::application::auth::{AccessCredential, TokenExchanger};
use crate::application::filter::{ToolInvocationResult, API_OPERATION_RESPONSE};
use crate::application::schema::{trim, SchemaDenylist};
use crate::infrastructure::model::types::ToolDeclaration;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Folder under the deployment root holding one subdirectory per plugin.
pub const PLUGINS_DIRECTORY: &str = "plugins";

/// Length of the directory-name suffix stripped when deriving the manifest
/// file name (`CalendarPlugin` -> `calendar-apiplugin.json`).
const PLUGIN_NAME_SUFFIX_LEN: usize = 6;
const MANIFEST_FILE_SUFFIX: &str = "-apiplugin.json";

/// Declarative description of one plugin's callable operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    #[serde(default)]
    pub description: Option<String>,
    /// Base resource URL all operation paths are resolved against.
    pub base_url: String,
    pub operations: Vec<OperationSchema>,
}

/// One callable HTTP operation of a plugin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSchema {
    pub id: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<OperationParameter>,
    #[serde(default)]
    pub response_schema: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationParameter {
    pub name: String,
    #[serde(default)]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    pub schema: Value,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    #[default]
    Query,
    Path,
    Body,
}

/// The operation/parameter pair whose schema is replaced by the sanitizer
/// output. Fixed per deployment; every other schema passes through
/// unchanged.
#[derive(Debug, Clone)]
pub struct SanitizeTarget {
    pub operation: String,
    pub parameter: String,
}

impl SanitizeTarget {
    pub fn new(operation: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameter: parameter.into(),
        }
    }

    pub fn matches(&self, operation: &str, parameter: &str) -> bool {
        self.operation.eq_ignore_ascii_case(operation)
            && self.parameter.eq_ignore_ascii_case(parameter)
    }
}

impl Default for SanitizeTarget {
    fn default() -> Self {
        Self {
            operation: "me_sendMail".into(),
            parameter: "payload".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to scan plugins directory {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("plugin {plugin} failed to load: {source}")]
    Load {
        plugin: String,
        #[source]
        source: PluginLoadError,
    },
}

#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("directory name is too short to derive a manifest file name")]
    NameTooShort,
    #[error("manifest {path} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("manifest {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("operation {operation} declares invalid HTTP method {method:?}")]
    InvalidMethod { operation: String, method: String },
    #[error("operation {operation} is declared by more than one plugin")]
    DuplicateOperation { operation: String },
}

/// Attaches a fresh downstream bearer to every outbound call, on behalf of
/// the request's user.
#[derive(Clone)]
pub struct AuthenticatedCaller {
    exchanger: TokenExchanger,
    credential: AccessCredential,
}

impl AuthenticatedCaller {
    pub fn new(exchanger: TokenExchanger, credential: AccessCredential) -> Self {
        Self {
            exchanger,
            credential,
        }
    }

    /// Bearer value for the next call; empty when the exchange failed, so
    /// the downstream API is the one to reject the request.
    pub async fn bearer(&self, cancel: &CancellationToken) -> String {
        self.exchanger
            .exchange(&self.credential, cancel)
            .await
            .bearer_or_empty()
            .to_string()
    }
}

/// One manifest operation bound to its plugin and ready to call.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub plugin: String,
    pub name: String,
    pub description: String,
    method: Method,
    url: String,
    parameters: Vec<BoundParameter>,
    expected_schema: Option<Value>,
}

#[derive(Debug, Clone)]
struct BoundParameter {
    name: String,
    location: ParameterLocation,
    required: bool,
    schema: Value,
}

impl RegisteredTool {
    /// Declaration handed to the model: an object schema over the
    /// operation's parameters.
    pub fn declaration(&self) -> ToolDeclaration {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for parameter in &self.parameters {
            properties.insert(parameter.name.clone(), parameter.schema.clone());
            if parameter.required {
                required.push(Value::String(parameter.name.clone()));
            }
        }
        ToolDeclaration {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
            strict: true,
        }
    }

    pub fn parameter_schema(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name.eq_ignore_ascii_case(name))
            .map(|parameter| &parameter.schema)
    }

    async fn invoke(
        &self,
        arguments: &Value,
        http: &reqwest::Client,
        caller: &AuthenticatedCaller,
        cancel: &CancellationToken,
    ) -> ToolInvocationResult {
        let bearer = caller.bearer(cancel).await;

        let mut url = self.url.clone();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut body = Map::new();

        for parameter in &self.parameters {
            let Some(value) = arguments.get(&parameter.name) else {
                continue;
            };
            match parameter.location {
                ParameterLocation::Path => {
                    url = url.replace(&format!("{{{}}}", parameter.name), &scalar(value));
                }
                ParameterLocation::Query => {
                    query.push((parameter.name.clone(), scalar(value)));
                }
                ParameterLocation::Body => {
                    body.insert(parameter.name.clone(), value.clone());
                }
            }
        }

        debug!(tool = %self.name, method = %self.method, url = %url, "Dispatching tool call");

        let mut request = http
            .request(self.method.clone(), &url)
            .header("Authorization", format!("Bearer {bearer}"));
        if !query.is_empty() {
            request = request.query(&query);
        }
        if !body.is_empty() {
            // A single body parameter is sent as-is; several are namespaced
            // under their parameter names.
            let payload = if body.len() == 1 {
                body.into_iter()
                    .next()
                    .map(|(_, value)| value)
                    .unwrap_or(Value::Null)
            } else {
                Value::Object(body)
            };
            request = request.json(&payload);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(tool = %self.name, "Tool invocation cancelled");
                return self.failure(json!({ "error": "invocation cancelled" }));
            }
            result = request.send() => result,
        };

        match response {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                let payload = serde_json::from_str::<Value>(&text)
                    .unwrap_or(Value::String(text));
                if status.is_success() {
                    self.success(payload)
                } else {
                    warn!(tool = %self.name, status = status.as_u16(), "Tool call was rejected downstream");
                    self.failure(json!({ "status": status.as_u16(), "error": payload }))
                }
            }
            Err(source) => {
                warn!(tool = %self.name, %source, "Tool call transport failure");
                self.failure(json!({ "error": source.to_string() }))
            }
        }
    }

    fn success(&self, output: Value) -> ToolInvocationResult {
        ToolInvocationResult {
            tool: self.name.clone(),
            success: true,
            output,
            response_type: API_OPERATION_RESPONSE.into(),
            expected_schema: self.expected_schema.clone(),
        }
    }

    fn failure(&self, output: Value) -> ToolInvocationResult {
        ToolInvocationResult {
            tool: self.name.clone(),
            success: false,
            output,
            response_type: API_OPERATION_RESPONSE.into(),
            expected_schema: self.expected_schema.clone(),
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The complete, request-scoped set of callable tools.
pub struct ToolSet {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
    caller: AuthenticatedCaller,
    http: reqwest::Client,
}

impl ToolSet {
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index
            .get(&name.to_lowercase())
            .map(|position| &self.tools[*position])
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(RegisteredTool::declaration).collect()
    }

    /// Execute one tool call. Failures, including an unknown tool name, are
    /// reported inside the result so the model can react to them.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> ToolInvocationResult {
        let Some(tool) = self.get(name) else {
            warn!(requested_tool = %name, "Unknown tool requested by the model");
            return ToolInvocationResult {
                tool: name.to_string(),
                success: false,
                output: json!({ "error": format!("unknown tool: {name}") }),
                response_type: API_OPERATION_RESPONSE.into(),
                expected_schema: None,
            };
        };
        tool.invoke(arguments, &self.http, &self.caller, cancel).await
    }
}

/// Derive the manifest file name from a plugin directory name.
fn manifest_file_name(directory: &str) -> Result<String, PluginLoadError> {
    let chars = directory.chars().count();
    if chars <= PLUGIN_NAME_SUFFIX_LEN {
        return Err(PluginLoadError::NameTooShort);
    }
    let stem: String = directory
        .chars()
        .take(chars - PLUGIN_NAME_SUFFIX_LEN)
        .collect();
    Ok(format!("{}{MANIFEST_FILE_SUFFIX}", stem.to_lowercase()))
}

/// Discover and load every plugin under `<root>/plugins`, binding each
/// operation to `caller` and applying the sanitizer to the configured
/// target. Fails fast on the first broken plugin.
pub async fn load_all(
    root: &Path,
    caller: AuthenticatedCaller,
    http: reqwest::Client,
    sanitize: &SanitizeTarget,
    denylist: &SchemaDenylist,
) -> Result<ToolSet, PluginError> {
    let plugins_dir = root.join(PLUGINS_DIRECTORY);
    debug!(path = %plugins_dir.display(), "Scanning for plugins");

    let mut entries = tokio::fs::read_dir(&plugins_dir)
        .await
        .map_err(|source| PluginError::Scan {
            path: plugins_dir.clone(),
            source,
        })?;

    let mut directories = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|source| PluginError::Scan {
        path: plugins_dir.clone(),
        source,
    })? {
        let path = entry.path();
        if path.is_dir() {
            directories.push(path);
        }
    }
    directories.sort();

    let mut tools = Vec::new();
    let mut index = HashMap::new();
    for directory in directories {
        let plugin = directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let loaded = load_plugin(&directory, &plugin, sanitize, denylist)
            .await
            .map_err(|source| PluginError::Load {
                plugin: plugin.clone(),
                source,
            })?;
        for tool in loaded {
            let key = tool.name.to_lowercase();
            if index.contains_key(&key) {
                return Err(PluginError::Load {
                    plugin,
                    source: PluginLoadError::DuplicateOperation {
                        operation: tool.name,
                    },
                });
            }
            index.insert(key, tools.len());
            tools.push(tool);
        }
    }

    info!(tools = tools.len(), "Plugin load complete");
    Ok(ToolSet {
        tools,
        index,
        caller,
        http,
    })
}

async fn load_plugin(
    directory: &Path,
    plugin: &str,
    sanitize: &SanitizeTarget,
    denylist: &SchemaDenylist,
) -> Result<Vec<RegisteredTool>, PluginLoadError> {
    let manifest_path = directory.join(manifest_file_name(plugin)?);
    debug!(plugin, path = %manifest_path.display(), "Reading plugin manifest");

    let content = tokio::fs::read_to_string(&manifest_path)
        .await
        .map_err(|source| PluginLoadError::Read {
            path: manifest_path.clone(),
            source,
        })?;
    let manifest: PluginManifest =
        serde_json::from_str(&content).map_err(|source| PluginLoadError::Parse {
            path: manifest_path.clone(),
            source,
        })?;

    let base = manifest.base_url.trim_end_matches('/');
    let mut tools = Vec::with_capacity(manifest.operations.len());
    for operation in manifest.operations {
        let method = Method::from_bytes(operation.method.to_uppercase().as_bytes()).map_err(
            |_| PluginLoadError::InvalidMethod {
                operation: operation.id.clone(),
                method: operation.method.clone(),
            },
        )?;

        let parameters = operation
            .parameters
            .into_iter()
            .map(|parameter| {
                let schema = if sanitize.matches(&operation.id, &parameter.name) {
                    debug!(
                        operation = %operation.id,
                        parameter = %parameter.name,
                        "Applying schema sanitizer to parameter"
                    );
                    trim(&parameter.schema, denylist)
                } else {
                    parameter.schema
                };
                BoundParameter {
                    name: parameter.name,
                    location: parameter.location,
                    required: parameter.required,
                    schema,
                }
            })
            .collect();

        tools.push(RegisteredTool {
            plugin: plugin.to_string(),
            name: operation.id,
            description: operation.description.unwrap_or_default(),
            method,
            url: format!("{base}/{}", operation.path.trim_start_matches('/')),
            parameters,
            expected_schema: operation.response_schema,
        });
    }
    Ok(tools)
}
