use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Settings;
use crate::error::{LogseqError, Result};

/// One node of a page's outline tree as the API returns it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub children: Vec<Block>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl Block {
    /// String-valued property, e.g. `blogdate`.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Where blocks come from. The exporter only ever sees this trait.
pub trait BlockSource {
    /// Fetch one block together with its children.
    fn get_block(&self, uuid: &str) -> Result<Block>;
    /// Page metadata; fails when the page does not exist.
    fn get_page(&self, name: &str) -> Result<Value>;
    /// Root blocks of a page with their full subtrees.
    fn get_page_blocks_tree(&self, name: &str) -> Result<Vec<Block>>;
}

pub struct LogseqClient {
    http: Client,
    api_url: String,
    token: Option<String>,
}

impl LogseqClient {
    /// Calls block until the server answers; no request timeout is set.
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(LogseqError::Client)?;
        Ok(LogseqClient {
            http,
            api_url: settings.api_url.clone(),
            token: settings.token.clone(),
        })
    }

    fn call(&self, method: &str, args: Value) -> Result<Value> {
        let method = format!("logseq.Editor.{}", method);
        debug!(%method, %args, "api call");

        let mut request = self.http.post(&self.api_url).json(&rpc_payload(&method, args));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let transport = |source| LogseqError::Transport {
            method: method.clone(),
            source,
        };
        let response = request.send().map_err(transport)?;
        let status = response.status();
        let body = response.text().map_err(transport)?;
        if !status.is_success() {
            return Err(LogseqError::Status {
                method,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| LogseqError::Decode { method, source })
    }

    fn call_non_empty(&self, method: &str, args: Value, arg: &str) -> Result<Value> {
        let value = self.call(method, args)?;
        if is_truthy(&value) {
            Ok(value)
        } else {
            Err(LogseqError::Empty {
                method: method.to_string(),
                arg: arg.to_string(),
            })
        }
    }
}

impl BlockSource for LogseqClient {
    fn get_block(&self, uuid: &str) -> Result<Block> {
        let value = self.call_non_empty("getBlock", json!([uuid, {"includeChildren": true}]), uuid)?;
        decode("getBlock", value)
    }

    fn get_page(&self, name: &str) -> Result<Value> {
        self.call_non_empty("getPage", json!([name, {"includeChildren": false}]), name)
    }

    fn get_page_blocks_tree(&self, name: &str) -> Result<Vec<Block>> {
        let value = self.call_non_empty("getPageBlocksTree", json!([name]), name)?;
        decode("getPageBlocksTree", value)
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|source| LogseqError::Decode {
        method: method.to_string(),
        source,
    })
}

/// Request body shape the API server expects.
pub fn rpc_payload(method: &str, args: Value) -> Value {
    json!({ "method": method, "args": args })
}

/// JSON "truthiness": null, false, zero, and empty strings/arrays/objects are all rejected.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
