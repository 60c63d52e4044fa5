//! Rewrite rules and the two file formats they are read from
//!
//! Transformation files list named rules as blank-line separated blocks:
//!
//! ```text
//! % comments run from % to end of line
//! # drop-det
//!
//! NP < DT=det
//!
//! prune det
//! ```
//!
//! Post-processing configs are INI-style, one section per rule, and map
//! pattern names ("targets") to the rules applied to their matches.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use pest::Parser;
use regex::Regex;
use thiserror::Error;

mod grammar {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "rules.pest"]
    pub struct ConfigParser;
}

use grammar::{ConfigParser, Rule as ConfigRule};

/// A named rewrite rule: a tree pattern and the script applied to its matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub pattern: String,
    pub script: String,
}

impl Rule {
    pub fn new(name: &str, pattern: &str, script: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            script: script.to_string(),
        }
    }
}

/// Error type for rule file failures
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Rule error: {0}")]
    Syntax(String),

    #[error("Rule error: transformation {0} needs a name, a pattern and a script")]
    IncompleteTransformation(String),

    #[error("Rule error: duplicate rule {0}")]
    DuplicateRule(String),

    #[error("Rule error: entry before the first [section]: {0}")]
    MissingSection(String),

    #[error("Rule error: rule {rule} has no {key}")]
    MissingKey { rule: String, key: &'static str },

    #[error("Rule error: failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<pest::error::Error<ConfigRule>> for RuleError {
    fn from(err: pest::error::Error<ConfigRule>) -> Self {
        RuleError::Syntax(err.to_string())
    }
}

/// Blank lines between transformation blocks
static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("block separator regex is valid"));

fn read_file(path: &Path) -> Result<String, RuleError> {
    fs::read_to_string(path).map_err(|source| RuleError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Read an ordered list of rules from a transformation file
pub fn read_transformations(path: impl AsRef<Path>) -> Result<Vec<Rule>, RuleError> {
    parse_transformations(&read_file(path.as_ref())?)
}

/// Parse a transformation file: `# name`, pattern and script blocks
pub fn parse_transformations(text: &str) -> Result<Vec<Rule>, RuleError> {
    let content = text
        .lines()
        .map(|line| line.split('%').next().unwrap_or_default().trim())
        .collect::<Vec<_>>()
        .join("\n");
    let content = content.trim();
    if content.is_empty() {
        return Ok(Vec::new());
    }

    let blocks: Vec<String> = BLOCK_SEPARATOR
        .split(content)
        .map(|block| block.replace('\n', " "))
        .collect();

    let mut rules: Vec<Rule> = Vec::new();
    for group in blocks.chunks(3) {
        let name = group[0].trim_start_matches([' ', '#']).trim().to_string();
        let [_, pattern, script] = group else {
            return Err(RuleError::IncompleteTransformation(name));
        };
        if rules.iter().any(|rule| rule.name == name) {
            return Err(RuleError::DuplicateRule(name));
        }
        rules.push(Rule {
            name,
            pattern: pattern.trim().to_string(),
            script: script.trim().to_string(),
        });
    }

    Ok(rules)
}

/// Rules to apply per target pattern name, in first-seen target order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostProcessRules {
    targets: Vec<(String, Vec<Rule>)>,
}

impl PostProcessRules {
    pub fn get(&self, target: &str) -> Option<&[Rule]> {
        self.targets
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, rules)| rules.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.targets
            .iter()
            .map(|(name, rules)| (name.as_str(), rules.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn add(&mut self, target: &str, rule: Rule) {
        match self.targets.iter_mut().find(|(name, _)| name == target) {
            Some((_, rules)) => rules.push(rule),
            None => self.targets.push((target.to_string(), vec![rule])),
        }
    }
}

/// Read a post-processing config file
pub fn read_post_process_rules(path: impl AsRef<Path>) -> Result<PostProcessRules, RuleError> {
    parse_post_process_rules(&read_file(path.as_ref())?)
}

/// Parse an INI-style post-processing config
pub fn parse_post_process_rules(text: &str) -> Result<PostProcessRules, RuleError> {
    let sections = parse_sections(text)?;
    let mut config = PostProcessRules::default();

    for (name, entries) in sections {
        let lookup = |key: &'static str| {
            entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.trim().to_string())
                .ok_or_else(|| RuleError::MissingKey {
                    rule: name.clone(),
                    key,
                })
        };
        let targets = lookup("targets")?;
        let rule = Rule {
            name: name.clone(),
            pattern: lookup("pattern")?,
            script: lookup("script")?,
        };

        for target in targets.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            config.add(target, rule.clone());
        }
    }

    Ok(config)
}

type Section = (String, Vec<(String, String)>);

/// Split an INI document into sections of (lowercased key, value) entries
fn parse_sections(text: &str) -> Result<Vec<Section>, RuleError> {
    let mut pairs = ConfigParser::parse(ConfigRule::config, text)?;
    let Some(config) = pairs.next() else {
        return Ok(Vec::new());
    };

    let mut sections: Vec<Section> = Vec::new();
    for pair in config.into_inner() {
        match pair.as_rule() {
            ConfigRule::header => {
                let name = pair.into_inner().as_str().trim().to_string();
                if sections.iter().any(|(existing, _)| *existing == name) {
                    return Err(RuleError::DuplicateRule(name));
                }
                sections.push((name, Vec::new()));
            }
            ConfigRule::entry => {
                let mut inner = pair.into_inner();
                let key = inner.next().map(|p| p.as_str()).unwrap_or_default();
                let value = inner.next().map(|p| p.as_str()).unwrap_or_default();
                let Some((_, entries)) = sections.last_mut() else {
                    return Err(RuleError::MissingSection(key.to_string()));
                };
                entries.push((key.to_lowercase(), value.trim().to_string()));
            }
            ConfigRule::continuation => {
                let value = pair.into_inner().as_str().trim();
                if value.is_empty() {
                    continue;
                }
                // Indented lines continue the previous value
                let Some((_, entries)) = sections.last_mut() else {
                    return Err(RuleError::MissingSection(value.to_string()));
                };
                let Some((_, previous)) = entries.last_mut() else {
                    return Err(RuleError::Syntax(format!("unexpected indented line: {}", value)));
                };
                previous.push(' ');
                previous.push_str(value);
            }
            _ => {}
        }
    }

    Ok(sections)
}
