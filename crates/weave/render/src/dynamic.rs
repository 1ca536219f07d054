//! Dynamic block expansion (pass 1).
//!
//! Named `__MARKER__` placeholders expand into generated multi-line
//! blocks before any YAML parsing happens. Block markers replace their
//! whole line and inherit its indentation; inline markers substitute in
//! place.

use crate::env::RenderEnv;
use weave_types::Topology;

const ENDPOINT_LIST: &str = "__ENDPOINT_LIST__";
const PORTS_ENV: &str = "__PORTS_ENV__";
const TOPOLOGY_JSON: &str = "__TOPOLOGY_JSON__";
const PROXY_LOCATIONS: &str = "__PROXY_LOCATIONS__";
const TELEMETRY_ENV: &str = "__TELEMETRY_ENV__";
const FRONTEND_IMAGE: &str = "__FRONTEND_IMAGE__";
const BACKEND_IMAGE: &str = "__BACKEND_IMAGE__";
const UI_MODE: &str = "__UI_MODE__";
const DATAPREP_URL: &str = "__DATAPREP_URL__";

/// Default front-end surface when the flow does not select one.
const DEFAULT_UI_MODE: &str = "chat";

/// Pre-computed expansion blocks for one topology + environment.
pub struct DynamicBlocks {
    endpoint_list: String,
    ports_env: String,
    topology_json: String,
    proxy_locations: String,
    telemetry_env: String,
    frontend_image: String,
    backend_image: String,
    ui_mode: String,
    dataprep_url: String,
}

impl DynamicBlocks {
    pub fn new(topology: &Topology, env: &RenderEnv) -> serde_json::Result<Self> {
        let endpoint_list = topology
            .app
            .endpoint_list
            .iter()
            .map(|e| format!("- {e}"))
            .collect::<Vec<_>>()
            .join("\n");

        let ports_env = topology
            .app
            .ports_info
            .iter()
            .map(|(name, port)| format!("{name}={port}"))
            .collect::<Vec<_>>()
            .join("\n");

        let proxy_locations = topology
            .app
            .ui_config_info
            .iter()
            .map(|(upstream, cfg)| {
                format!(
                    "location {path} {{\n    proxy_pass http://{upstream}:{port};\n}}",
                    path = cfg.endpoint_path,
                    port = cfg.port,
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let telemetry_env = env
            .telemetry_endpoint
            .as_deref()
            .map(|url| format!("TELEMETRY_ENDPOINT: \"{url}\""))
            .unwrap_or_default();

        let dataprep_url = topology
            .app
            .ui_config_info
            .iter()
            .find(|(_, cfg)| cfg.url_name == "APP_DATAPREP_URL")
            .map(|(endpoint, cfg)| {
                format!("http://{endpoint}:{}{}", cfg.port, cfg.endpoint_path)
            })
            .unwrap_or_default();

        Ok(Self {
            endpoint_list,
            ports_env,
            topology_json: topology.to_pretty_json()?,
            proxy_locations,
            telemetry_env,
            frontend_image: env.frontend_image.clone(),
            backend_image: env.backend_image.clone(),
            ui_mode: topology
                .app
                .ui_mode
                .clone()
                .unwrap_or_else(|| DEFAULT_UI_MODE.to_string()),
            dataprep_url,
        })
    }

    /// Expand every marker present in `text`.
    pub fn expand(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (marker, block) in [
            (ENDPOINT_LIST, &self.endpoint_list),
            (PORTS_ENV, &self.ports_env),
            (TOPOLOGY_JSON, &self.topology_json),
            (PROXY_LOCATIONS, &self.proxy_locations),
            (TELEMETRY_ENV, &self.telemetry_env),
        ] {
            out = replace_block(&out, marker, block);
        }
        out = out.replace(FRONTEND_IMAGE, &self.frontend_image);
        out = out.replace(BACKEND_IMAGE, &self.backend_image);
        out = out.replace(UI_MODE, &self.ui_mode);
        out.replace(DATAPREP_URL, &self.dataprep_url)
    }
}

/// Replace every line containing `marker` with `block`, re-indented to
/// the marker's column. An empty block drops the line entirely.
fn replace_block(text: &str, marker: &str, block: &str) -> String {
    if !text.contains(marker) {
        return text.to_string();
    }
    let mut out = Vec::new();
    for line in text.lines() {
        match line.find(marker) {
            None => out.push(line.to_string()),
            Some(col) => {
                if block.is_empty() {
                    continue;
                }
                let indent = &line[..col];
                for block_line in block.lines() {
                    if block_line.is_empty() {
                        out.push(String::new());
                    } else {
                        out.push(format!("{indent}{block_line}"));
                    }
                }
            }
        }
    }
    let mut joined = out.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_replacement_inherits_indentation() {
        let text = "data:\n  list: |\n    __X__\n";
        let out = replace_block(text, "__X__", "- a\n- b");
        assert_eq!(out, "data:\n  list: |\n    - a\n    - b\n");
    }

    #[test]
    fn empty_block_drops_the_line() {
        let text = "environment:\n  __X__\n  KEY: \"v\"\n";
        let out = replace_block(text, "__X__", "");
        assert_eq!(out, "environment:\n  KEY: \"v\"\n");
    }

    #[test]
    fn untouched_text_passes_through() {
        let text = "a:\n  b: 1\n";
        assert_eq!(replace_block(text, "__X__", "y"), text);
    }
}
