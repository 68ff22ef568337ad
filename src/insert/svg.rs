//! One-time cleanup applied to SVG text before it is handed to the host.

use std::sync::OnceLock;

use regex::Regex;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

fn prolog() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<\?xml[^>]*>\s*").expect("static regex"))
}

fn doctype() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>\s*").expect("static regex"))
}

fn svg_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<svg(\s|>)").expect("static regex"))
}

/// Strip BOM, XML prolog and doctype; make sure the root declares the SVG namespace.
pub fn normalize_svg(text: &str) -> String {
    let text = text.trim_start_matches('\u{feff}').trim();
    let text = prolog().replace(text, "");
    let text = doctype().replace(&text, "");

    if text.contains("xmlns=") {
        return text.into_owned();
    }
    svg_open()
        .replace(&text, format!("<svg xmlns=\"{SVG_NAMESPACE}\"${{1}}").as_str())
        .into_owned()
}
