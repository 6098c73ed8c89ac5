//! Import alias resolution (`@/` to `/src/` and the like).

use crate::config::DevConfig;
use crate::error::Result;
use crate::plugin::{Plugin, PluginContext, PluginEnforce, ResolveHook, ResolvedId};
use async_trait::async_trait;

/// Plugin that handles import aliases.
///
/// Maps import paths like `@/components` to `/src/components`, then resolves
/// the replacement through the rest of the pipeline.
pub struct AliasPlugin {
    aliases: Vec<(String, String)>,
}

impl AliasPlugin {
    /// Create a new alias plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            aliases: Vec::new(),
        }
    }

    /// Create an alias plugin from the config's alias table.
    #[must_use]
    pub fn from_config(config: &DevConfig) -> Self {
        config
            .alias
            .iter()
            .fold(Self::new(), |plugin, (from, to)| plugin.alias(from, to))
    }

    /// Add an alias. Longer prefixes take precedence.
    #[must_use]
    pub fn alias(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.aliases.push((from.into(), to.into()));
        self.aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        Plugin::new("alias")
            .with_enforce(PluginEnforce::Pre)
            .with_resolve(self)
    }

    /// Replacement for `specifier`, if an alias applies.
    fn apply(&self, specifier: &str) -> Option<String> {
        self.aliases
            .iter()
            .find(|(from, _)| alias_matches(from, specifier))
            .map(|(from, to)| format!("{to}{}", &specifier[from.len()..]))
    }
}

/// Whether the alias key `from` applies to `specifier`: an exact match, or a
/// prefix ending at a path separator.
pub(crate) fn alias_matches(from: &str, specifier: &str) -> bool {
    specifier.strip_prefix(from).is_some_and(|rest| {
        rest.is_empty() || from.ends_with('/') || rest.starts_with('/')
    })
}

impl Default for AliasPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResolveHook for AliasPlugin {
    async fn resolve_id(
        &self,
        specifier: &str,
        importer: Option<&str>,
        ctx: &PluginContext<'_>,
    ) -> Result<Option<ResolvedId>> {
        let Some(replaced) = self.apply(specifier) else {
            return Ok(None);
        };
        // A replacement that is itself aliased would recurse forever.
        if self.apply(&replaced).is_some() {
            tracing::warn!(specifier, replaced, "alias resolves to another alias; skipped");
            return Ok(None);
        }
        ctx.resolve(&replaced, importer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginContainer;

    struct Echo;

    #[async_trait]
    impl ResolveHook for Echo {
        async fn resolve_id(
            &self,
            specifier: &str,
            _importer: Option<&str>,
            _ctx: &PluginContext<'_>,
        ) -> Result<Option<ResolvedId>> {
            Ok(specifier
                .starts_with('/')
                .then(|| ResolvedId::new(format!("/project{specifier}"))))
        }
    }

    fn container(alias: AliasPlugin) -> PluginContainer {
        PluginContainer::new(vec![
            Plugin::new("echo").with_resolve(Echo),
            alias.into_plugin(),
        ])
    }

    #[test]
    fn test_apply() {
        let plugin = AliasPlugin::new().alias("@", "/src").alias("@/", "/app/");
        assert_eq!(plugin.apply("@").as_deref(), Some("/src"));
        assert_eq!(plugin.apply("@/Button").as_deref(), Some("/app/Button"));
        assert_eq!(plugin.apply("@scope/pkg"), None);
        assert_eq!(plugin.apply("lodash"), None);
    }

    #[tokio::test]
    async fn test_alias_reenters_pipeline() {
        let container = container(AliasPlugin::new().alias("~", "/src"));
        let resolved = container.resolve_id("~/App.tsx", None).await.unwrap();
        assert_eq!(resolved, Some(ResolvedId::new("/project/src/App.tsx")));
    }

    #[tokio::test]
    async fn test_self_referencing_alias_is_skipped() {
        let container = container(AliasPlugin::new().alias("lib", "lib/x"));
        assert_eq!(container.resolve_id("lib", None).await.unwrap(), None);
    }

    #[test]
    fn test_from_config() {
        let config = DevConfig::new("/p").with_alias("@/", "/src/");
        let plugin = AliasPlugin::from_config(&config);
        assert_eq!(plugin.apply("@/main.ts").as_deref(), Some("/src/main.ts"));
    }
}
