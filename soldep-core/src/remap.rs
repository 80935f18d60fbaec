//! Foundry-style import remappings: ordered `prefix=target` rules applied to
//! non-relative specifiers before resolution.

/// One `prefix=target` rule, optionally scoped with a `context:` prefix. The
/// context is parsed but not consulted; contextless matching mirrors tools
/// that ignore it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Remapping {
    pub context: Option<String>,
    pub from: String,
    pub to: String,
}

pub fn parse_remapping(line: &str) -> Option<Remapping> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (from, to) = line.split_once('=')?;
    let (context, from) = match from.split_once(':') {
        Some((context, rest)) if !context.is_empty() => (Some(context.to_string()), rest),
        _ => (None, from),
    };
    let from = from.trim();
    let to = to.trim();
    if from.is_empty() || to.is_empty() {
        return None;
    }
    Some(Remapping {
        context,
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// Line-oriented remappings file; `#` lines are comments, malformed lines are
/// dropped.
pub fn parse_remappings(data: &str) -> Vec<Remapping> {
    data.lines().filter_map(parse_remapping).collect()
}

/// First matching rule wins. Relative specifiers never remap. A target that
/// carries an `npm:` prefix is substituted with the prefix stripped and no
/// further rules applied, so a remap chain cannot loop through itself.
pub fn apply(remappings: &[Remapping], specifier: &str) -> String {
    if specifier.starts_with("./") || specifier.starts_with("../") {
        return specifier.to_string();
    }
    for rule in remappings {
        if let Some(rest) = specifier.strip_prefix(rule.from.as_str()) {
            let target = rule.to.strip_prefix("npm:").unwrap_or(rule.to.as_str());
            return format!("{}{}", target, rest);
        }
    }
    specifier.to_string()
}
