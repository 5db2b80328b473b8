//! Generates the source text a worker runs before its user module.
//!
//! The bootstrap is an explicit template assembled from data, not a stringified
//! function, so the output survives minification and is testable as plain
//! string building. The generated source, in order: replays the page's script
//! imports, installs the in-worker message shim, announces readiness, then
//! configures the module root and runs the requested module.

use crate::worker::msg;
use std::fmt::Write;

/// Bumped whenever the generated source changes shape.
pub const BOOTSTRAP_VERSION: u32 = 1;

/// Builder for the worker bootstrap source.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    module_root: String,
    module_id: String,
    scripts: Vec<String>,
    loader: String,
}

impl Bootstrap {
    /// Default name of the module-loader global inside the worker.
    pub const DEFAULT_LOADER: &'static str = "loader";

    pub fn new(module_root: impl Into<String>, module_id: impl Into<String>) -> Self {
        Self {
            module_root: module_root.into(),
            module_id: module_id.into(),
            scripts: Vec::new(),
            loader: Self::DEFAULT_LOADER.to_owned(),
        }
    }

    /// Script URLs to replay inside the worker, in document order.
    pub fn with_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts.extend(scripts.into_iter().map(Into::into));
        self
    }

    /// Overrides the loader global. Must be a valid JS identifier.
    pub fn with_loader(mut self, loader: impl Into<String>) -> Self {
        self.loader = loader.into();
        self
    }

    /// Builds the worker source text.
    ///
    /// If any replayed script fails to import, `importScripts` throws and the
    /// failure surfaces on the worker's error channel. No retry.
    pub fn assemble(&self) -> String {
        let mut src = String::with_capacity(1024);

        let _ = writeln!(src, "\"use strict\";");
        let _ = writeln!(src, "// offstage bootstrap v{BOOTSTRAP_VERSION}");
        let _ = writeln!(src, "var SCRIPTS = {};", js_literal(&self.scripts));
        src.push_str(concat!(
            "for (var i = 0; i < SCRIPTS.length; i += 1) {\n",
            "    importScripts(SCRIPTS[i]);\n",
            "}\n",
        ));

        // Inbound queue plus the helpers worker modules rely on. The alive
        // announcement goes out before the user module starts running.
        let _ = writeln!(src, "var QUERIES = [];");
        let _ = writeln!(
            src,
            concat!(
                "onmessage = function (ev) {{\n",
                "    var msg = ev.data;\n",
                "    if (msg && msg.type === {query}) {{\n",
                "        QUERIES.push({{ type: {query}, data: msg.data }});\n",
                "    }}\n",
                "}};\n",
                "function poll() {{\n",
                "    var drained = QUERIES;\n",
                "    QUERIES = [];\n",
                "    return drained;\n",
                "}}\n",
                "function log() {{\n",
                "    postMessage({{ type: {log}, data: Array.prototype.slice.call(arguments) }});\n",
                "}}\n",
                "function post(data) {{\n",
                "    postMessage({{ type: {result}, data: data }});\n",
                "}}\n",
                "postMessage({{ type: {alive} }});"
            ),
            query = msg::QUERY,
            log = msg::LOG,
            result = msg::RESULT,
            alive = msg::ALIVE,
        );

        let _ = writeln!(
            src,
            "{}.setModuleRoot({});",
            self.loader,
            js_literal(&self.module_root)
        );
        let _ = writeln!(src, "{}.run({});", self.loader, js_literal(&self.module_id));

        src
    }
}

/// JSON-escapes a value into a JS literal.
fn js_literal<T: serde::Serialize>(value: &T) -> String {
    // Strings and string lists always encode.
    serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap() -> Bootstrap {
        Bootstrap::new("https://game.example/js/", "prime").with_scripts([
            "https://game.example/js/engine.js",
            "https://game.example/js/ui.js",
        ])
    }

    #[test]
    fn scripts_are_replayed_in_document_order() {
        let src = bootstrap().assemble();
        let first = src.find("engine.js").unwrap();
        let second = src.find("ui.js").unwrap();
        assert!(first < second);
        assert!(src.contains("importScripts(SCRIPTS[i])"));
    }

    #[test]
    fn alive_is_announced_before_the_module_runs() {
        let src = bootstrap().assemble();
        let alive = src.find(&format!("postMessage({{ type: {} }});", msg::ALIVE));
        let run = src.find("loader.run(\"prime\");");
        assert!(alive.unwrap() < run.unwrap());
    }

    #[test]
    fn module_root_is_configured_before_run() {
        let src = bootstrap().assemble();
        let root = src
            .find("loader.setModuleRoot(\"https://game.example/js/\");")
            .unwrap();
        let run = src.find("loader.run(").unwrap();
        assert!(root < run);
    }

    #[test]
    fn shim_uses_the_wire_discriminants() {
        let src = bootstrap().assemble();
        assert!(src.contains(&format!("msg.type === {}", msg::QUERY)));
        assert!(src.contains(&format!("type: {}, data: Array", msg::LOG)));
        assert!(src.contains(&format!("type: {}, data: data", msg::RESULT)));
    }

    #[test]
    fn spliced_strings_are_escaped() {
        let src = Bootstrap::new("./", "pri\"me\\").assemble();
        assert!(src.contains(r#"loader.run("pri\"me\\");"#));
    }

    #[test]
    fn loader_global_can_be_overridden() {
        let src = bootstrap().with_loader("enchant").assemble();
        assert!(src.contains("enchant.setModuleRoot("));
        assert!(src.contains("enchant.run(\"prime\");"));
        assert!(!src.contains("loader.run"));
    }

    #[test]
    fn template_is_versioned() {
        let src = bootstrap().assemble();
        assert!(src.contains(&format!("// offstage bootstrap v{BOOTSTRAP_VERSION}")));
    }
}
