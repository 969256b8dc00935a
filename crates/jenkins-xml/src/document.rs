//! Top-level documents exchanged with the server.

use crate::element::{Fields, RawElement, XmlWriter};
use crate::error::Result;

/// A document that can be read from and written to XML.
pub trait XmlDocument: Sized {
    fn from_xml(xml: &str) -> Result<Self>;
    fn to_xml(&self) -> String;
}

/// Untyped documents (job `config.xml`) pass through unchanged.
impl XmlDocument for String {
    fn from_xml(xml: &str) -> Result<Self> {
        Ok(xml.to_string())
    }

    fn to_xml(&self) -> String {
        self.clone()
    }
}

impl XmlDocument for RawElement {
    fn from_xml(xml: &str) -> Result<Self> {
        RawElement::parse(xml)
    }

    fn to_xml(&self) -> String {
        RawElement::to_xml(self)
    }
}

/// Body for `installNecessaryPlugins`: one `<install plugin="short@version"/>`
/// per plugin.
pub fn install_plugins_document<S, V>(plugins: &[(S, V)]) -> String
where
    S: AsRef<str>,
    V: AsRef<str>,
{
    let mut w = XmlWriter::new();
    w.open("jenkins", &[]);
    for (short_name, version) in plugins {
        let spec = format!("{}@{}", short_name.as_ref(), version.as_ref());
        w.empty("install", &[("plugin", spec.as_str())]);
    }
    w.close("jenkins");
    w.finish()
}

/// Extract the agent secret from a `slave-agent.jnlp` file: the first
/// `<argument>` under `<application-desc>`.
pub fn jnlp_secret(jnlp: &str) -> Result<Option<String>> {
    let root = RawElement::parse(jnlp)?;
    let fields = Fields::of(&root)?;
    let Some(app) = fields.get("application-desc") else {
        return Ok(None);
    };
    Fields::of(app)?.opt_text("argument")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_plugins_document() {
        let doc = install_plugins_document(&[("git", "4.11.0"), ("workflow-aggregator", "latest")]);
        assert_eq!(
            doc,
            r#"<jenkins><install plugin="git@4.11.0"/><install plugin="workflow-aggregator@latest"/></jenkins>"#
        );
    }

    #[test]
    fn test_jnlp_secret() {
        let jnlp = r#"<?xml version="1.0" encoding="UTF-8"?>
<jnlp codebase="http://jenkins/computer/agent-1/" spec="1.0+">
  <information><title>Agent for agent-1</title></information>
  <application-desc main-class="hudson.remoting.jnlp.Main">
    <argument>4a5f1b2c3d</argument>
    <argument>agent-1</argument>
  </application-desc>
</jnlp>"#;
        assert_eq!(jnlp_secret(jnlp).unwrap().as_deref(), Some("4a5f1b2c3d"));
    }

    #[test]
    fn test_jnlp_secret_missing() {
        assert_eq!(jnlp_secret("<jnlp/>").unwrap(), None);
    }

    #[test]
    fn test_string_document_is_identity() {
        let xml = "<project><description>x</description></project>";
        assert_eq!(String::from_xml(xml).unwrap().to_xml(), xml);
    }
}
