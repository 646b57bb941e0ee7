//! Template rendering for managed configuration files
//!
//! Templates use a deliberately small syntax:
//! - `{{ key }}` substitutes a value (lists render one item per line)
//! - `{{ key | join }}` renders a list space-separated
//! - `{{#if key}} ... {{/if}}` and `{{#unless key}} ... {{/unless}}` keep or
//!   drop a block based on the value's truthiness (blocks do not nest)

use crate::value::PolicyValue;
use hostguard_core::{Error, Result};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

/// Values available to a template
pub type TemplateContext = BTreeMap<String, PolicyValue>;

/// Produces file content from a template identifier and a context
pub trait Renderer: Send + Sync {
    fn render(&self, template: &str, context: &TemplateContext) -> Result<Vec<u8>>;
}

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("login.defs", include_str!("../templates/login.defs")),
    ("securetty", include_str!("../templates/securetty")),
    ("10.hardcore.conf", include_str!("../templates/10.hardcore.conf")),
    (
        "hardening_profile.sh",
        include_str!("../templates/hardening_profile.sh"),
    ),
    ("99-hardening.sh", include_str!("../templates/99-hardening.sh")),
    ("passwdqc", include_str!("../templates/passwdqc")),
    ("tally2", include_str!("../templates/tally2")),
    (
        "99-hardening-sysctl.conf",
        include_str!("../templates/99-hardening-sysctl.conf"),
    ),
];

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?s)\{\{#(if|unless)\s+([A-Za-z0-9_]+)\s*\}\}\n?",
            r"(.*?)\{\{/(?:if|unless)\}\}\n?",
        ))
        .expect("block pattern is valid")
    })
}

fn var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*(?:\|\s*(join)\s*)?\}\}")
            .expect("variable pattern is valid")
    })
}

/// Renders built-in templates, optionally overridden by files in a directory
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    dir: Option<PathBuf>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer `dir/<template>` over the built-in of the same name
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn source(&self, template: &str) -> Result<String> {
        if let Some(dir) = &self.dir {
            let path = dir.join(template);
            if path.is_file() {
                debug!("Using template override {}", path.display());
                return std::fs::read_to_string(&path).map_err(|e| Error::Render {
                    template: template.to_string(),
                    message: format!("cannot read {}: {}", path.display(), e),
                });
            }
        }

        BUILTIN_TEMPLATES
            .iter()
            .find(|(name, _)| *name == template)
            .map(|(_, body)| body.to_string())
            .ok_or_else(|| Error::Render {
                template: template.to_string(),
                message: "unknown template".into(),
            })
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, template: &str, context: &TemplateContext) -> Result<Vec<u8>> {
        let source = self.source(template)?;
        render_str(template, &source, context).map(String::into_bytes)
    }
}

/// Render `source` against `context`
pub fn render_str(template: &str, source: &str, context: &TemplateContext) -> Result<String> {
    let lookup = |key: &str| {
        context.get(key).ok_or_else(|| Error::Render {
            template: template.to_string(),
            message: format!("undefined variable '{}'", key),
        })
    };

    let blocks = replace_all(block_regex(), source, |caps| {
        let truthy = lookup(&caps[2])?.is_truthy();
        let keep = if &caps[1] == "if" { truthy } else { !truthy };
        Ok(if keep { caps[3].to_string() } else { String::new() })
    })?;

    replace_all(var_regex(), &blocks, |caps| {
        let value = lookup(&caps[1])?;
        match (value, caps.get(2)) {
            (PolicyValue::Map(_), _) => Err(Error::Render {
                template: template.to_string(),
                message: format!("cannot render mapping '{}'", &caps[1]),
            }),
            (PolicyValue::List(items), Some(_)) => Ok(items.join(" ")),
            (value, _) => Ok(value.to_string()),
        }
    })
}

fn replace_all<F>(re: &Regex, input: &str, mut replace: F) -> Result<String>
where
    F: FnMut(&Captures<'_>) -> Result<String>,
{
    let mut output = String::with_capacity(input.len());
    let mut last = 0;
    for caps in re.captures_iter(input) {
        let whole = caps.get(0).expect("group 0 always matches");
        output.push_str(&input[last..whole.start()]);
        output.push_str(&replace(&caps)?);
        last = whole.end();
    }
    output.push_str(&input[last..]);
    Ok(output)
}
