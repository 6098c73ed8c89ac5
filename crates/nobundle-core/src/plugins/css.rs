//! Stylesheet support: CSS files are served as modules that inject a
//! `<style>` tag and accept their own hot updates.

use crate::error::Result;
use crate::plugin::{Plugin, PluginContext, TransformHook, TransformResult};
use crate::url::is_css_request;
use async_trait::async_trait;

/// Serves stylesheets as script modules that inject a `<style>` tag.
pub struct CssPlugin;

impl CssPlugin {
    #[must_use]
    pub fn into_plugin(self) -> Plugin {
        Plugin::new("css").with_transform(self)
    }
}

#[async_trait]
impl TransformHook for CssPlugin {
    async fn transform(
        &self,
        code: &str,
        id: &str,
        _ctx: &PluginContext<'_>,
    ) -> Result<Option<TransformResult>> {
        if !is_css_request(id) {
            return Ok(None);
        }
        Ok(Some(TransformResult::code(create_css_module(code))))
    }
}

/// Create a CSS-as-JS module that injects a <style> tag.
fn create_css_module(css: &str) -> String {
    let escaped = css
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${");

    format!(
        r#"const css = `{escaped}`;
const style = document.createElement('style');
style.setAttribute('data-nobundle-css', '');
style.textContent = css;
document.head.appendChild(style);

if (import.meta.hot) {{
  import.meta.hot.accept();
  import.meta.hot.dispose(() => {{
    style.remove();
  }});
}}

export default css;
"#
    )
}
