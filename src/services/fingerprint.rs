//! Content fingerprinting.
//!
//! A page is reduced to the markup that carries meaning before it is hashed:
//! scripts, styles, meta tags and volatile widgets are dropped, attributes are
//! reduced to an allow-list, whitespace is collapsed, and residual tokens such
//! as timestamps or session ids are erased. Two fetches of an unchanged page
//! should therefore hash identically even when the server injects noise.

use std::collections::HashSet;
use std::fmt::Write as _;

use ego_tree::NodeRef;
use regex::{Captures, Regex};
use scraper::{Html, Node, Selector};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::VolatileRules;

struct CompiledPattern {
    name: String,
    regex: Regex,
    mixed_alphanumeric: bool,
}

/// Normalizes pages according to a set of [`VolatileRules`] and hashes them.
pub struct Fingerprinter {
    version: u32,
    removals: Vec<Selector>,
    allowed_attributes: HashSet<String>,
    patterns: Vec<CompiledPattern>,
}

impl Fingerprinter {
    /// Compile the rules. Fails on an invalid selector or pattern.
    pub fn new(rules: &VolatileRules) -> Result<Self> {
        let removals = rules
            .strip_selectors
            .iter()
            .chain(&rules.volatile_selectors)
            .map(|s| Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}"))))
            .collect::<Result<Vec<_>>>()?;

        let patterns = rules
            .text_patterns
            .iter()
            .map(|p| {
                Ok(CompiledPattern {
                    name: p.name.clone(),
                    regex: Regex::new(&p.pattern)?,
                    mixed_alphanumeric: p.mixed_alphanumeric,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Compiled fingerprint rules v{}: {} selectors, patterns [{}]",
            rules.version,
            removals.len(),
            patterns
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            version: rules.version,
            removals,
            allowed_attributes: rules
                .allowed_attributes
                .iter()
                .map(|a| a.to_ascii_lowercase())
                .collect(),
            patterns,
        })
    }

    /// Version of the rules this fingerprinter was built from.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Reduce a parsed page to its meaningful markup.
    pub fn normalize(&self, document: &Html) -> String {
        let removed: HashSet<_> = self
            .removals
            .iter()
            .flat_map(|sel| document.select(sel).map(|el| el.id()))
            .collect();

        let mut out = String::new();
        self.write_node(document.tree.root(), &removed, &mut out);
        self.strip_patterns(&out)
    }

    /// Parse and normalize raw HTML.
    pub fn normalize_html(&self, html: &str) -> String {
        self.normalize(&Html::parse_document(html))
    }

    /// Fingerprint of a parsed page.
    pub fn fingerprint_document(&self, document: &Html) -> String {
        fingerprint(&self.normalize(document))
    }

    /// Fingerprint of raw HTML.
    pub fn fingerprint_html(&self, html: &str) -> String {
        fingerprint(&self.normalize_html(html))
    }

    fn write_node(
        &self,
        node: NodeRef<'_, Node>,
        removed: &HashSet<ego_tree::NodeId>,
        out: &mut String,
    ) {
        match node.value() {
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.write_node(child, removed, out);
                }
            }
            Node::Element(el) => {
                if removed.contains(&node.id()) {
                    return;
                }
                let name = el.name();
                out.push('<');
                out.push_str(name);
                let mut attrs: Vec<_> = el
                    .attrs()
                    .filter(|(k, _)| self.allowed_attributes.contains(*k))
                    .collect();
                attrs.sort_unstable();
                for (key, value) in attrs {
                    let _ = write!(out, " {}=\"{}\"", key, collapse_whitespace(value));
                }
                out.push('>');
                for child in node.children() {
                    self.write_node(child, removed, out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Node::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if !collapsed.is_empty() {
                    out.push_str(&collapsed);
                }
            }
            // Comments, doctypes and processing instructions carry no content.
            _ => {}
        }
    }

    fn strip_patterns(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in &self.patterns {
            let replaced = if pattern.mixed_alphanumeric {
                pattern.regex.replace_all(&result, |caps: &Captures| {
                    let token = &caps[0];
                    if is_mixed_alphanumeric(token) {
                        String::new()
                    } else {
                        token.to_string()
                    }
                })
            } else {
                pattern.regex.replace_all(&result, "")
            };
            result = replaced.into_owned();
        }
        collapse_whitespace(&result)
    }
}

/// SHA-256 hex digest of normalized content.
pub fn fingerprint(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_mixed_alphanumeric(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit()) && token.chars().any(|c| c.is_ascii_alphabetic())
}
