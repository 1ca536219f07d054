//! Static template registry.
//!
//! Every template ships compiled into the binary; service kinds map to
//! their template handles through a match, so an unknown kind is a
//! defined [`RenderError::TemplateNotFound`] instead of a file lookup
//! failure at render time.

use crate::error::{RenderError, RenderResult};
use weave_types::ServiceKind;

/// Compose and manifest documents for one service kind.
#[derive(Debug, Clone, Copy)]
pub struct TemplateHandle {
    /// Template identity used in error messages.
    pub name: &'static str,
    pub compose: &'static str,
    pub manifest: &'static str,
}

macro_rules! handle {
    ($name:literal) => {
        TemplateHandle {
            name: $name,
            compose: include_str!(concat!("../templates/compose/", $name, ".yaml")),
            manifest: include_str!(concat!("../templates/manifest/", $name, ".yaml")),
        }
    };
}

const VECTOR_STORE: TemplateHandle = handle!("vector_store");
const EMBED_SERVER: TemplateHandle = handle!("embed_server");
const TEXTGEN_SERVER: TemplateHandle = handle!("textgen_server");
const DATAPREP: TemplateHandle = handle!("dataprep");
const EMBEDDING: TemplateHandle = handle!("embedding");
const RETRIEVER: TemplateHandle = handle!("retriever");
const RERANKING: TemplateHandle = handle!("reranking");
const LLM: TemplateHandle = handle!("llm");
const APP: TemplateHandle = handle!("app");

/// Reverse-proxy config fragment rendered alongside the app entry.
pub const PROXY_CONF: &str = include_str!("../templates/proxy.conf");

/// Environment/port file template.
pub const ENV_FILE: &str = include_str!("../templates/env.tmpl");

/// Maps service kinds to their built-in templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRegistry;

impl TemplateRegistry {
    pub fn builtin() -> Self {
        Self
    }

    /// Template handle for a service kind.
    pub fn get(&self, kind: &ServiceKind) -> RenderResult<TemplateHandle> {
        match kind {
            ServiceKind::VectorStore => Ok(VECTOR_STORE),
            ServiceKind::EmbedServer => Ok(EMBED_SERVER),
            ServiceKind::TextGenServer => Ok(TEXTGEN_SERVER),
            ServiceKind::DataPrep => Ok(DATAPREP),
            ServiceKind::Embedding => Ok(EMBEDDING),
            ServiceKind::Retriever => Ok(RETRIEVER),
            ServiceKind::Reranking => Ok(RERANKING),
            ServiceKind::LlmChat => Ok(LLM),
            ServiceKind::App => Ok(APP),
            ServiceKind::Other(_) => Err(RenderError::TemplateNotFound { kind: kind.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_kind_has_a_template() {
        let registry = TemplateRegistry::builtin();
        for kind in [
            ServiceKind::VectorStore,
            ServiceKind::EmbedServer,
            ServiceKind::TextGenServer,
            ServiceKind::DataPrep,
            ServiceKind::Embedding,
            ServiceKind::Retriever,
            ServiceKind::Reranking,
            ServiceKind::LlmChat,
            ServiceKind::App,
        ] {
            let handle = registry.get(&kind).unwrap();
            assert!(!handle.compose.is_empty());
            assert!(!handle.manifest.is_empty());
        }
    }

    #[test]
    fn unknown_kind_is_template_not_found() {
        let registry = TemplateRegistry::builtin();
        let err = registry
            .get(&ServiceKind::Other("svc@video".into()))
            .unwrap_err();
        assert!(matches!(err, RenderError::TemplateNotFound { .. }));
    }
}
