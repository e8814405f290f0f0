use crate::config::BundleConfig;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

// Matches `<script src="...">...</script>` tags; group 1 is the src value.
const SCRIPT_TAG: &str = r#"<script\s[^>]*src=["']([^"']+)["'][^>]*>\s*</script>"#;

fn script_tag_pattern() -> Regex {
    Regex::new(SCRIPT_TAG).expect("script tag pattern is valid")
}

fn is_local_script(src: &str, external_modules: &[String]) -> bool {
    !src.starts_with("https://")
        && !src.starts_with("http://")
        && !external_modules
            .iter()
            .any(|module| src.contains(module.as_str()))
}

/// The first script reference in the template that is neither CDN-hosted nor
/// an external module.
pub fn find_entry_script(html: &str, external_modules: &[String]) -> Option<String> {
    script_tag_pattern()
        .captures_iter(html)
        .map(|captures| captures[1].to_string())
        .find(|src| is_local_script(src, external_modules))
}

/// Removes every local script tag, leaving CDN and external-module tags in
/// place.
pub fn strip_local_scripts(html: &str, external_modules: &[String]) -> String {
    script_tag_pattern()
        .replace_all(html, |captures: &regex::Captures| {
            if is_local_script(&captures[1], external_modules) {
                String::new()
            } else {
                captures[0].to_string()
            }
        })
        .into_owned()
}

/// Removes the script tag referencing exactly `src`.
pub fn strip_script_tag(html: &str, src: &str) -> String {
    let pattern = Regex::new(&format!(
        r#"<script\s[^>]*src=["']{}["'][^>]*>\s*</script>"#,
        regex::escape(src)
    ))
    .expect("escaped script tag pattern is valid");
    pattern.replace_all(html, "").into_owned()
}

/// Concatenates every `.css` file in `dir`, in filename order.
pub fn combine_css(dir: &Path) -> Result<String> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read styles directory {:?}", dir))?;

    let mut sheets: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("css")
        })
        .collect();
    sheets.sort();

    let mut css = String::new();
    for path in sheets {
        css.push_str(
            &fs::read_to_string(&path)
                .with_context(|| format!("Failed to read style sheet {:?}", path))?,
        );
    }
    Ok(css)
}

/// Inlines the entry script and its relative imports into one IIFE. Each
/// module is included once; external-module and `.css` imports are dropped
/// (the CDN and style injection passes cover them).
pub fn inline_script(entry: &Path, external_modules: &[String]) -> Result<String> {
    let mut visited = HashSet::new();
    let body = inline_module(entry, external_modules, &mut visited)?;
    Ok(format!("(() => {{\n{}}})();\n", body))
}

fn inline_module(
    path: &Path,
    external_modules: &[String],
    visited: &mut HashSet<PathBuf>,
) -> Result<String> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Script {:?} not found", path))?;
    if !visited.insert(canonical.clone()) {
        return Ok(String::new());
    }
    let source = fs::read_to_string(&canonical)
        .with_context(|| format!("Failed to read script {:?}", canonical))?;

    let import_pattern =
        Regex::new(r#"(?m)^\s*import\s+(?:[^'"\n]*?from\s+)?["']([^"']+)["'];?[^\S\n]*\n?"#)
            .expect("import pattern is valid");

    let mut out = String::new();
    let mut last = 0;
    for captures in import_pattern.captures_iter(&source) {
        let whole = captures.get(0).expect("capture 0 always present");
        let target = &captures[1];
        out.push_str(&source[last..whole.start()]);
        last = whole.end();

        if target.ends_with(".css")
            || external_modules
                .iter()
                .any(|module| target.contains(module.as_str()))
        {
            continue;
        }
        if target.starts_with("./") || target.starts_with("../") {
            let dir = canonical.parent().unwrap_or(Path::new("."));
            let mut resolved = dir.join(target);
            if resolved.extension().is_none() {
                resolved.set_extension("js");
            }
            out.push_str(&inline_module(&resolved, external_modules, visited)?);
        } else {
            return Err(anyhow!(
                "Cannot inline bare module import '{}' in {:?}; list it under external_modules",
                target,
                canonical
            ));
        }
    }
    out.push_str(&source[last..]);

    // Module scope becomes IIFE scope, so export qualifiers go away.
    let export_pattern = Regex::new(r"(?m)^export\s+").expect("export pattern is valid");
    Ok(export_pattern.replace_all(&out, "").into_owned())
}

/// Produces the self-contained HTML artifact: template minus local script
/// tags, plus CDN links, a combined `<style>` block, and the inlined script.
pub fn bundle_site(config: &BundleConfig, entry_override: Option<&str>) -> Result<PathBuf> {
    let template_dir = config.template.parent().unwrap_or(Path::new("."));
    let mut html = fs::read_to_string(&config.template)
        .with_context(|| format!("Failed to read template {:?}", config.template))?;

    let entry = match entry_override {
        Some(entry) => {
            html = strip_local_scripts(&html, &config.external_modules);
            entry.to_string()
        }
        None => {
            let entry = find_entry_script(&html, &config.external_modules).ok_or_else(|| {
                anyhow!("No local entry script found in {:?}", config.template)
            })?;
            html = strip_script_tag(&html, &entry);
            entry
        }
    };
    println!("Bundling entry script: {}", entry);

    for link in &config.cdn_scripts {
        let tag = format!("<script src=\"{}\"></script>\n", link);
        html = html.replacen("</head>", &format!("{}</head>", tag), 1);
    }

    let css = combine_css(&config.styles_dir)?;
    html = html.replacen("</head>", &format!("<style>\n{}</style>\n</head>", css), 1);

    let script = inline_script(&template_dir.join(&entry), &config.external_modules)?;
    html = html.replacen("</body>", &format!("<script>\n{}</script>\n</body>", script), 1);

    if let Some(parent) = config.output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    fs::write(&config.output, html)
        .with_context(|| format!("Failed to write {:?}", config.output))?;
    println!("Single-file artifact written to {:?}", config.output);

    Ok(config.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn externals() -> Vec<String> {
        vec!["maplibre-gl".to_string()]
    }

    const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>t</title>
</head>
<body>
<div id="map"></div>
<script src="https://cdn.example.org/lib.js"></script>
<script src="vendor/maplibre-gl.js"></script>
<script src="scripts/map.js"></script>
</body>
</html>
"#;

    #[test]
    fn entry_detection_skips_cdn_and_external_scripts() {
        assert_eq!(
            find_entry_script(TEMPLATE, &externals()),
            Some("scripts/map.js".to_string())
        );
    }

    #[test]
    fn entry_detection_fails_without_local_scripts() {
        let html = r#"<script src="https://cdn.example.org/lib.js"></script>"#;
        assert_eq!(find_entry_script(html, &externals()), None);
    }

    #[test]
    fn strip_local_scripts_keeps_cdn_and_external_tags() {
        let stripped = strip_local_scripts(TEMPLATE, &externals());
        assert!(stripped.contains("https://cdn.example.org/lib.js"));
        assert!(stripped.contains("vendor/maplibre-gl.js"));
        assert!(!stripped.contains("scripts/map.js"));
    }

    #[test]
    fn strip_script_tag_removes_only_the_named_tag() {
        let stripped = strip_script_tag(TEMPLATE, "scripts/map.js");
        assert!(!stripped.contains("scripts/map.js"));
        assert!(stripped.contains("https://cdn.example.org/lib.js"));
    }

    #[test]
    fn combine_css_concatenates_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.css"), "b{}\n").unwrap();
        fs::write(dir.path().join("a.css"), "a{}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(combine_css(dir.path()).unwrap(), "a{}\nb{}\n");
    }

    #[test]
    fn inline_script_includes_each_module_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("entry.js"),
            "import maplibregl from 'maplibre-gl';\n\
             import '../styles/style.css';\n\
             import { shared } from './shared.js';\n\
             import { other } from './other.js';\n\
             console.log(shared, other);\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("shared.js"),
            "export const shared = 1;\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("other.js"),
            "import { shared } from './shared.js';\nexport const other = shared + 1;\n",
        )
        .unwrap();

        let script = inline_script(&dir.path().join("entry.js"), &externals()).unwrap();
        assert_eq!(script.matches("const shared = 1;").count(), 1);
        assert!(script.contains("const other = shared + 1;"));
        assert!(script.contains("console.log(shared, other);"));
        assert!(!script.contains("import"));
        assert!(!script.contains("export"));
        assert!(script.starts_with("(() => {"));
    }

    #[test]
    fn inline_script_rejects_bare_imports() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("entry.js"), "import 'left-pad';\n").unwrap();
        assert!(inline_script(&dir.path().join("entry.js"), &externals()).is_err());
    }

    #[test]
    fn missing_entry_script_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(inline_script(&dir.path().join("missing.js"), &externals()).is_err());
    }

    fn site_config(dir: &Path) -> BundleConfig {
        BundleConfig {
            template: dir.join("index.html"),
            styles_dir: dir.join("styles"),
            output: dir.join("dist/single-file.html"),
            cdn_scripts: vec!["https://cdn.example.org/maplibre-gl.js".to_string()],
            external_modules: externals(),
        }
    }

    fn write_site(dir: &Path) {
        fs::write(
            dir.join("index.html"),
            "<!DOCTYPE html>\n<html>\n<head>\n<title>t</title>\n</head>\n<body>\n\
             <div id=\"map\"></div>\n<script src=\"scripts/map.js\"></script>\n</body>\n</html>\n",
        )
        .unwrap();
        fs::create_dir_all(dir.join("styles")).unwrap();
        fs::write(dir.join("styles/style.css"), "#map{height:400px}\n").unwrap();
        fs::create_dir_all(dir.join("scripts")).unwrap();
        fs::write(
            dir.join("scripts/map.js"),
            "import maplibregl from 'maplibre-gl';\nconsole.log('hi');\n",
        )
        .unwrap();
    }

    #[test]
    fn bundle_site_produces_a_self_contained_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());

        let output = bundle_site(&site_config(dir.path()), None).unwrap();
        let html = fs::read_to_string(output).unwrap();

        assert!(html.contains("https://cdn.example.org/maplibre-gl.js"));
        assert!(html.contains("<style>\n#map{height:400px}"));
        assert!(html.contains("console.log('hi');"));
        assert!(!html.contains("src=\"scripts/map.js\""));
    }

    #[test]
    fn bundle_site_accepts_an_explicit_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        fs::write(
            dir.path().join("scripts/alt.js"),
            "console.log('alt');\n",
        )
        .unwrap();

        let output = bundle_site(&site_config(dir.path()), Some("scripts/alt.js")).unwrap();
        let html = fs::read_to_string(output).unwrap();
        assert!(html.contains("console.log('alt');"));
        // The template's own entry tag is stripped along with other local scripts.
        assert!(!html.contains("src=\"scripts/map.js\""));
    }

    #[test]
    fn bundle_site_without_entry_script_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_site(dir.path());
        fs::write(
            dir.path().join("index.html"),
            "<html><head></head><body></body></html>",
        )
        .unwrap();

        assert!(bundle_site(&site_config(dir.path()), None).is_err());
    }
}
