//! HMR client runtime.
//!
//! Served at the configured client path and imported by the bootstrap the
//! import-analysis stage prepends to every instrumented module. Provides the
//! `import.meta.hot` API:
//! - `hot.accept()` / `hot.accept(cb)`: self-accepting module
//! - `hot.accept(deps, cb)`: accept specific dep updates
//! - `hot.dispose(cb)`: cleanup before module replacement
//! - `hot.data`: persist data across updates

use crate::config::DevConfig;
use crate::error::Result;
use crate::plugin::{LoadHook, LoadResult, Plugin, PluginContext, ResolveHook, ResolvedId};
use crate::url::clean_url;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves and loads the client runtime.
pub struct ClientPlugin {
    public_path: String,
}

impl ClientPlugin {
    #[must_use]
    pub fn new(config: &DevConfig) -> Self {
        Self {
            public_path: config.client_public_path.clone(),
        }
    }

    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        let client = Arc::new(self);
        Plugin::new("client")
            .with_resolve(Arc::clone(&client))
            .with_load(client)
    }
}

#[async_trait]
impl ResolveHook for ClientPlugin {
    async fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&str>,
        _ctx: &PluginContext<'_>,
    ) -> Result<Option<ResolvedId>> {
        Ok((clean_url(specifier) == self.public_path).then(|| ResolvedId::new(&self.public_path)))
    }
}

#[async_trait]
impl LoadHook for ClientPlugin {
    async fn load(&self, id: &str, _ctx: &PluginContext<'_>) -> Result<Option<LoadResult>> {
        Ok((id == self.public_path).then(|| LoadResult::code(HMR_CLIENT_RUNTIME)))
    }
}

const HMR_CLIENT_RUNTIME: &str = r"
const hotModulesMap = new Map();
const disposeMap = new Map();
const dataMap = new Map();

const protocol = location.protocol === 'https:' ? 'wss' : 'ws';
const socket = new WebSocket(`${protocol}://${location.host}`, 'nobundle-hmr');

socket.addEventListener('message', ({ data }) => {
  handleMessage(JSON.parse(data));
});

socket.addEventListener('close', () => {
  console.log('[nobundle] server connection lost. Reloading...');
  setTimeout(() => location.reload(), 1000);
});

function handleMessage(msg) {
  switch (msg.type) {
    case 'connected':
      console.log('[nobundle] connected.');
      break;
    case 'update':
      msg.updates.forEach((update) => {
        if (update.type === 'js-update') {
          fetchUpdate(update);
        }
      });
      break;
    case 'full-reload':
      location.reload();
      break;
    case 'error':
      console.error('[nobundle] build error:\n' + msg.message);
      break;
  }
}

async function fetchUpdate({ path, acceptedPath, timestamp }) {
  const mod = hotModulesMap.get(path);
  if (!mod) {
    location.reload();
    return;
  }

  const disposer = disposeMap.get(acceptedPath);
  if (disposer) {
    await disposer(dataMap.get(acceptedPath));
  }

  let fetchedModule;
  try {
    const [acceptedPathWithoutQuery, query] = acceptedPath.split('?');
    fetchedModule = await import(
      acceptedPathWithoutQuery + `?t=${timestamp}${query ? `&${query}` : ''}`
    );
  } catch (e) {
    console.error(`[nobundle] failed to fetch update for ${acceptedPath}`, e);
    return;
  }

  for (const { deps, fn } of mod.callbacks) {
    fn(deps.map((dep) => (dep === acceptedPath ? fetchedModule : undefined)));
  }
  console.log(`[nobundle] hot updated: ${path}`);
}

export function createHotContext(ownerPath) {
  if (!dataMap.has(ownerPath)) {
    dataMap.set(ownerPath, {});
  }

  const mod = hotModulesMap.get(ownerPath);
  if (mod) {
    mod.callbacks = [];
  }

  function acceptDeps(deps, callback = () => {}) {
    const entry = hotModulesMap.get(ownerPath) || { id: ownerPath, callbacks: [] };
    entry.callbacks.push({ deps, fn: callback });
    hotModulesMap.set(ownerPath, entry);
  }

  return {
    get data() {
      return dataMap.get(ownerPath);
    },
    accept(deps, callback) {
      if (typeof deps === 'function' || !deps) {
        acceptDeps([ownerPath], ([mod]) => deps && deps(mod));
      } else if (typeof deps === 'string') {
        acceptDeps([deps], ([mod]) => callback && callback(mod));
      } else if (Array.isArray(deps)) {
        acceptDeps(deps, callback);
      }
    },
    dispose(cb) {
      disposeMap.set(ownerPath, cb);
    },
  };
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginContainer;

    #[tokio::test]
    async fn test_serves_runtime_at_public_path() {
        let config = DevConfig::new("/p");
        let container = PluginContainer::new(vec![ClientPlugin::new(&config).into_plugin()]);

        let resolved = container.resolve_id("/@nobundle/client?t=1", None).await.unwrap();
        assert_eq!(resolved, Some(ResolvedId::new("/@nobundle/client")));

        let loaded = container.load("/@nobundle/client").await.unwrap().unwrap();
        assert!(loaded.code.contains("export function createHotContext"));
        assert!(container.resolve_id("/src/main.ts", None).await.unwrap().is_none());
    }
}
