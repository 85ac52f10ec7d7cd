//! Express JavaScript rendering for conversion artifacts.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;

use super::routes::express_path;
use super::{ArtifactKind, ConversionArtifact, MethodStub, ParamBinding, RouteBinding};
use crate::types::BindingSource;

/// Words a Java identifier may use that JavaScript reserves.
const JS_RESERVED: &[&str] = &[
    "arguments", "await", "delete", "eval", "export", "function", "in", "let", "typeof",
    "var", "with", "yield", "debugger",
];

/// A file ready for the writer, relative to the conversion root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedFile {
    pub relative_path: String,
    pub contents: String,
}

/// Render one artifact to JavaScript.
pub fn render_artifact(artifact: &ConversionArtifact) -> RenderedFile {
    let contents = match artifact.kind {
        ArtifactKind::Router => render_router(artifact),
        ArtifactKind::ServiceStub => render_stub(artifact),
    };
    RenderedFile {
        relative_path: artifact.relative_path(),
        contents,
    }
}

/// Render `app.js`, which mounts every router and serves `/health`.
pub fn render_app(artifacts: &[ConversionArtifact]) -> RenderedFile {
    let mut out = String::new();
    out.push_str("// Generated by strata.\n");
    out.push_str("const express = require('express');\n\n");
    out.push_str("const app = express();\n");
    out.push_str("app.use(express.json());\n\n");

    let mut vars = HashSet::new();
    for artifact in artifacts.iter().filter(|a| a.kind == ArtifactKind::Router) {
        let base = lower_camel(&js_ident(&artifact.module_name));
        let mut var = base.clone();
        let mut n = 2;
        while !vars.insert(var.clone()) {
            var = format!("{}{}", base, n);
            n += 1;
        }
        let module = format!("./{}/{}", artifact.target_dir(), artifact.module_name);
        let _ = writeln!(out, "const {} = require('{}');", var, js_string(&module));
        let _ = writeln!(out, "app.use({});", var);
    }

    out.push_str("\napp.get('/health', (req, res) => res.json({ status: 'ok' }));\n\n");
    out.push_str("const port = process.env.PORT || 3000;\n");
    out.push_str("if (require.main === module) {\n");
    out.push_str("  app.listen(port, () => console.log(`Server listening on ${port}`));\n");
    out.push_str("}\n\n");
    out.push_str("module.exports = app;\n");

    RenderedFile {
        relative_path: "app.js".to_string(),
        contents: out,
    }
}

fn render_router(artifact: &ConversionArtifact) -> String {
    let mut out = header(artifact);
    out.push_str("const express = require('express');\n");

    let delegate_var = match &artifact.delegate {
        Some(delegate) => {
            let class = js_ident(&delegate.name);
            let _ = writeln!(
                out,
                "const {} = require('{}');",
                class,
                js_string(&delegate.require_path())
            );
            out.push_str("\nconst router = express.Router();\n");
            let var = lower_camel(&class);
            let _ = writeln!(out, "const {} = new {}();", var, class);
            Some(var)
        }
        None => {
            out.push_str("\nconst router = express.Router();\n");
            None
        }
    };

    for route in &artifact.routes {
        out.push('\n');
        render_route(&mut out, route, delegate_var.as_deref());
    }

    out.push_str("\nmodule.exports = router;\n");
    out
}

fn render_route(out: &mut String, route: &RouteBinding, delegate: Option<&str>) {
    let _ = writeln!(
        out,
        "// {} {} -> {}",
        route.verb.as_str().to_uppercase(),
        route.path,
        route.method_name
    );
    let _ = writeln!(
        out,
        "router.{}('{}', async (req, res, next) => {{",
        route.verb.as_str(),
        js_string(&express_path(&route.path))
    );
    out.push_str("  try {\n");

    let single_body = route
        .params
        .iter()
        .filter(|p| p.source == BindingSource::Body)
        .count()
        == 1;
    for param in &route.params {
        let _ = writeln!(out, "    const {} = {};", js_ident(&param.name), request_read(param, single_body));
    }

    let args = argument_list(&route.params);
    match delegate {
        Some(var) => {
            let _ = writeln!(out, "    const result = await {}.{}({});", var, route.method_name, args);
        }
        None => out.push_str("    const result = undefined;\n"),
    }
    if route.return_type == "void" {
        out.push_str("    res.status(204).end();\n");
    } else {
        out.push_str("    res.json(result);\n");
    }
    out.push_str("  } catch (err) {\n");
    out.push_str("    next(err);\n");
    out.push_str("  }\n");
    out.push_str("});\n");
}

fn request_read(param: &ParamBinding, single_body: bool) -> String {
    let name = js_string(&param.name);
    match param.source {
        BindingSource::Path => format!("req.params['{}']", name),
        BindingSource::Query => format!("req.query['{}']", name),
        BindingSource::Body | BindingSource::None if single_body => "req.body".to_string(),
        BindingSource::Body | BindingSource::None => format!("(req.body || {{}})['{}']", name),
    }
}

fn render_stub(artifact: &ConversionArtifact) -> String {
    let mut out = header(artifact);
    let class = js_ident(&artifact.simple_name);
    let _ = writeln!(out, "/**\n * Placeholder for `{}` ({}).\n */", artifact.class_name, artifact.category);
    let _ = writeln!(out, "class {} {{", class);

    let mut seen = HashSet::new();
    let mut first = true;
    for method in &artifact.methods {
        if !seen.insert(method.name.as_str()) {
            continue;
        }
        let overloads: Vec<&MethodStub> = artifact
            .methods
            .iter()
            .filter(|m| m.name == method.name)
            .collect();
        if !first {
            out.push('\n');
        }
        first = false;
        render_stub_method(&mut out, &class, method, &overloads);
    }

    out.push_str("}\n\n");
    let _ = writeln!(out, "module.exports = {};", class);
    out
}

fn render_stub_method(out: &mut String, class: &str, method: &MethodStub, overloads: &[&MethodStub]) {
    out.push_str("  /**\n");
    for param in &method.params {
        let _ = writeln!(out, "   * @param {{{}}} {}", param.declared_type, js_ident(&param.name));
    }
    if !method.return_type.is_empty() && method.return_type != "void" {
        let _ = writeln!(out, "   * @returns {{Promise<{}>}}", method.return_type);
    }
    let _ = writeln!(out, "   * Cyclomatic complexity of the original: {}", method.complexity.value());
    if overloads.len() > 1 {
        out.push_str("   * Java overloads:\n");
        for overload in overloads {
            let params = overload
                .params
                .iter()
                .map(|p| format!("{} {}", p.declared_type, p.name))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "   *   {}({})", overload.name, params);
        }
    }
    out.push_str("   */\n");
    let _ = writeln!(out, "  async {}({}) {{", method.name, argument_list(&method.params));
    let _ = writeln!(
        out,
        "    throw new Error('Not implemented: {}.{}');",
        js_string(class),
        js_string(&method.name)
    );
    out.push_str("  }\n");
}

fn header(artifact: &ConversionArtifact) -> String {
    format!(
        "// Generated by strata from {} ({}).\n\n",
        artifact.source_path, artifact.class_name
    )
}

fn argument_list(params: &[ParamBinding]) -> String {
    params
        .iter()
        .map(|p| js_ident(&p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn js_ident(name: &str) -> String {
    let cleaned = name.replace('.', "_");
    if JS_RESERVED.contains(&cleaned.as_str()) {
        format!("{}_", cleaned)
    } else {
        cleaned
    }
}

fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn js_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
