//! Node properties: the heterogeneous `<nodeProperties>` list.
//!
//! Members are identified by element name rather than a `class` attribute,
//! and the server may hand back XStream-mangled names
//! (`hudson.node__monitors...`). Decoding accepts both forms and encoding
//! always emits the canonical one.

use crate::element::{Fields, RawElement, XmlWriter, parse_children};
use crate::error::Result;

pub const ENV_VARS_PROPERTY: &str = "hudson.slaves.EnvironmentVariablesNodeProperty";
pub const TOOL_LOCATION_PROPERTY: &str = "hudson.tools.ToolLocationNodeProperty";
pub const DISK_SPACE_MONITOR_PROPERTY: &str = "hudson.node_monitors.DiskSpaceMonitorNodeProperty";
pub const WORKSPACE_CLEANUP_PROPERTY: &str =
    "hudson.plugins.ws_cleanup.DisableDeferredWipeoutNodeProperty";

const TOOL_LOCATION_ENTRY: &str = "hudson.tools.ToolLocationNodeProperty_-ToolLocation";
const CASE_INSENSITIVE_COMPARATOR: &str = "java.lang.String$CaseInsensitiveComparator";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLocation {
    /// Tool descriptor, e.g. `hudson.model.JDK$DescriptorImpl`.
    pub tool_type: String,
    pub name: String,
    pub home: String,
}

/// Thresholds use the server's size syntax (`1GiB`, `500MiB`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSpaceMonitor {
    pub free_disk_space_threshold: String,
    pub free_temp_space_threshold: String,
    pub free_disk_space_warning_threshold: Option<String>,
    pub free_temp_space_warning_threshold: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceCleanup {
    /// Value of the `plugin` attribute (`ws-cleanup@<version>`), if any.
    pub plugin: Option<String>,
}

/// One member of a node's property list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeProperty {
    EnvironmentVariables(Vec<EnvVar>),
    ToolLocation(Vec<ToolLocation>),
    DiskSpaceMonitor(DiskSpaceMonitor),
    WorkspaceCleanup(WorkspaceCleanup),
    Raw(RawElement),
}

impl NodeProperty {
    /// Environment variables, sorted the way the server's case-insensitive
    /// tree map orders them.
    pub fn env_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: Vec<EnvVar> = vars
            .into_iter()
            .map(|(k, v)| EnvVar {
                key: k.into(),
                value: v.into(),
            })
            .collect();
        vars.sort_by_key(|v| v.key.to_lowercase());
        NodeProperty::EnvironmentVariables(vars)
    }

    pub fn disk_space_monitor(disk: impl Into<String>, temp: impl Into<String>) -> Self {
        NodeProperty::DiskSpaceMonitor(DiskSpaceMonitor {
            free_disk_space_threshold: disk.into(),
            free_temp_space_threshold: temp.into(),
            free_disk_space_warning_threshold: None,
            free_temp_space_warning_threshold: None,
        })
    }

    pub fn workspace_cleanup() -> Self {
        NodeProperty::WorkspaceCleanup(WorkspaceCleanup::default())
    }

    /// Canonical element name of this property.
    pub fn class(&self) -> String {
        match self {
            NodeProperty::EnvironmentVariables(_) => ENV_VARS_PROPERTY.to_string(),
            NodeProperty::ToolLocation(_) => TOOL_LOCATION_PROPERTY.to_string(),
            NodeProperty::DiskSpaceMonitor(_) => DISK_SPACE_MONITOR_PROPERTY.to_string(),
            NodeProperty::WorkspaceCleanup(_) => WORKSPACE_CLEANUP_PROPERTY.to_string(),
            NodeProperty::Raw(raw) => raw.canonical_name().into_owned(),
        }
    }

    /// Look up a variable in an environment-variables property.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        match self {
            NodeProperty::EnvironmentVariables(vars) => vars
                .iter()
                .find(|v| v.key == key)
                .map(|v| v.value.as_str()),
            _ => None,
        }
    }

    /// Decode one property element, dispatching on its (demangled) name.
    pub fn from_element(element: &RawElement) -> Result<Self> {
        let name = element.canonical_name();
        match name.as_ref() {
            ENV_VARS_PROPERTY => decode_env_vars(element).map(NodeProperty::EnvironmentVariables),
            TOOL_LOCATION_PROPERTY => decode_tool_locations(element).map(NodeProperty::ToolLocation),
            DISK_SPACE_MONITOR_PROPERTY => {
                let f = Fields::of(element)?;
                Ok(NodeProperty::DiskSpaceMonitor(DiskSpaceMonitor {
                    free_disk_space_threshold: f.text("freeDiskSpaceThreshold")?,
                    free_temp_space_threshold: f.text("freeTempSpaceThreshold")?,
                    free_disk_space_warning_threshold: f.opt_text("freeDiskSpaceWarningThreshold")?,
                    free_temp_space_warning_threshold: f.opt_text("freeTempSpaceWarningThreshold")?,
                }))
            }
            WORKSPACE_CLEANUP_PROPERTY => Ok(NodeProperty::WorkspaceCleanup(WorkspaceCleanup {
                plugin: element.attribute("plugin").map(str::to_string),
            })),
            _ => Ok(NodeProperty::Raw(element.clone())),
        }
    }

    pub fn write(&self, w: &mut XmlWriter) {
        match self {
            NodeProperty::EnvironmentVariables(vars) => {
                w.open(ENV_VARS_PROPERTY, &[]);
                w.open("envVars", &[("serialization", "custom")]);
                w.empty("unserializable-parents", &[]);
                w.open("tree-map", &[]);
                w.open("default", &[]);
                w.empty("comparator", &[("class", CASE_INSENSITIVE_COMPARATOR)]);
                w.close("default");
                w.display_element("int", vars.len());
                for var in vars {
                    w.text_element("string", &var.key);
                    w.text_element("string", &var.value);
                }
                w.close("tree-map");
                w.close("envVars");
                w.close(ENV_VARS_PROPERTY);
            }
            NodeProperty::ToolLocation(locations) => {
                w.open(TOOL_LOCATION_PROPERTY, &[]);
                w.open("locations", &[]);
                for loc in locations {
                    w.open(TOOL_LOCATION_ENTRY, &[]);
                    w.text_element("type", &loc.tool_type);
                    w.text_element("name", &loc.name);
                    w.text_element("home", &loc.home);
                    w.close(TOOL_LOCATION_ENTRY);
                }
                w.close("locations");
                w.close(TOOL_LOCATION_PROPERTY);
            }
            NodeProperty::DiskSpaceMonitor(monitor) => {
                w.open(DISK_SPACE_MONITOR_PROPERTY, &[]);
                w.text_element("freeDiskSpaceThreshold", &monitor.free_disk_space_threshold);
                w.text_element("freeTempSpaceThreshold", &monitor.free_temp_space_threshold);
                if let Some(v) = &monitor.free_disk_space_warning_threshold {
                    w.text_element("freeDiskSpaceWarningThreshold", v);
                }
                if let Some(v) = &monitor.free_temp_space_warning_threshold {
                    w.text_element("freeTempSpaceWarningThreshold", v);
                }
                w.close(DISK_SPACE_MONITOR_PROPERTY);
            }
            NodeProperty::WorkspaceCleanup(cleanup) => match &cleanup.plugin {
                Some(plugin) => w.empty(WORKSPACE_CLEANUP_PROPERTY, &[("plugin", plugin.as_str())]),
                None => w.empty(WORKSPACE_CLEANUP_PROPERTY, &[]),
            },
            NodeProperty::Raw(raw) => raw.write(w),
        }
    }
}

/// `<int>` count and comparator header are ignored; `<string>` children
/// pair up as key, value.
fn decode_env_vars(element: &RawElement) -> Result<Vec<EnvVar>> {
    let f = Fields::of(element)?;
    let Some(env) = f.get("envVars") else {
        return Ok(Vec::new());
    };
    let Some(map) = Fields::of(env)?.get("tree-map").cloned() else {
        return Ok(Vec::new());
    };

    let strings = map
        .children()?
        .into_iter()
        .filter(|c| c.name == "string")
        .map(|c| c.text())
        .collect::<Result<Vec<_>>>()?;

    Ok(strings
        .chunks_exact(2)
        .map(|pair| EnvVar {
            key: pair[0].clone(),
            value: pair[1].clone(),
        })
        .collect())
}

fn decode_tool_locations(element: &RawElement) -> Result<Vec<ToolLocation>> {
    let f = Fields::of(element)?;
    let Some(locations) = f.get("locations") else {
        return Ok(Vec::new());
    };
    locations
        .children()?
        .iter()
        .map(|entry| {
            let e = Fields::of(entry)?;
            Ok(ToolLocation {
                tool_type: e.text("type")?,
                name: e.text("name")?,
                home: e.text("home")?,
            })
        })
        .collect()
}

/// The `<nodeProperties>` list of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeProperties {
    pub properties: Vec<NodeProperty>,
}

impl NodeProperties {
    pub fn new(properties: Vec<NodeProperty>) -> Self {
        Self { properties }
    }

    pub fn from_element(element: &RawElement) -> Result<Self> {
        Self::from_fragment(&element.inner_xml)
    }

    /// Decode the members of a `<nodeProperties>` body.
    pub fn from_fragment(inner_xml: &str) -> Result<Self> {
        let properties = parse_children(inner_xml)?
            .iter()
            .map(NodeProperty::from_element)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { properties })
    }

    pub fn write(&self, w: &mut XmlWriter) {
        if self.properties.is_empty() {
            w.empty("nodeProperties", &[]);
            return;
        }
        w.open("nodeProperties", &[]);
        for property in &self.properties {
            property.write(w);
        }
        w.close("nodeProperties");
    }

    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        self.write(&mut w);
        w.finish()
    }

    /// First environment-variables property, if any.
    pub fn env_vars(&self) -> Option<&[EnvVar]> {
        self.properties.iter().find_map(|p| match p {
            NodeProperty::EnvironmentVariables(vars) => Some(vars.as_slice()),
            _ => None,
        })
    }
}

impl From<Vec<NodeProperty>> for NodeProperties {
    fn from(properties: Vec<NodeProperty>) -> Self {
        Self::new(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(props: &NodeProperties) -> NodeProperties {
        NodeProperties::from_element(&RawElement::parse(&props.to_xml()).unwrap()).unwrap()
    }

    #[test]
    fn test_env_vars_encoding() {
        let props = NodeProperties::new(vec![NodeProperty::env_vars([("K1", "V1")])]);
        let xml = props.to_xml();
        assert!(xml.contains(r#"<envVars serialization="custom"><unserializable-parents/>"#));
        assert!(xml.contains(
            r#"<comparator class="java.lang.String$CaseInsensitiveComparator"/></default><int>1</int><string>K1</string><string>V1</string>"#
        ));
    }

    #[test]
    fn test_env_vars_round_trip() {
        let props = NodeProperties::new(vec![NodeProperty::env_vars([
            ("PATH", "/usr/bin:/bin"),
            ("JAVA_OPTS", "-Dx=<y>"),
            ("empty", ""),
        ])]);
        let decoded = round_trip(&props);
        assert_eq!(decoded, props);
        assert_eq!(decoded.properties[0].env_var("JAVA_OPTS"), Some("-Dx=<y>"));
        assert_eq!(decoded.properties[0].env_var("empty"), Some(""));
    }

    #[test]
    fn test_env_vars_sorted_case_insensitively() {
        let NodeProperty::EnvironmentVariables(vars) =
            NodeProperty::env_vars([("b", "2"), ("A", "1"), ("C", "3")])
        else {
            panic!("expected env vars");
        };
        let keys: Vec<_> = vars.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "b", "C"]);
    }

    #[test]
    fn test_mixed_properties_round_trip() {
        let props = NodeProperties::new(vec![
            NodeProperty::env_vars([("K1", "V1"), ("K2", "V2")]),
            NodeProperty::disk_space_monitor("1GiB", "500MiB"),
            NodeProperty::workspace_cleanup(),
            NodeProperty::ToolLocation(vec![ToolLocation {
                tool_type: "hudson.model.JDK$DescriptorImpl".to_string(),
                name: "jdk17".to_string(),
                home: "/opt/jdk17".to_string(),
            }]),
            NodeProperty::Raw(RawElement::new(
                "com.example.CustomNodeProperty",
                "<flag>true</flag>",
            )),
        ]);
        assert_eq!(round_trip(&props), props);
    }

    #[test]
    fn test_mangled_names_decode_to_canonical() {
        let xml = "<nodeProperties>\
            <hudson.node__monitors.DiskSpaceMonitorNodeProperty>\
              <freeDiskSpaceThreshold>1GiB</freeDiskSpaceThreshold>\
              <freeTempSpaceThreshold>500MiB</freeTempSpaceThreshold>\
            </hudson.node__monitors.DiskSpaceMonitorNodeProperty>\
            <hudson.plugins.ws__cleanup.DisableDeferredWipeoutNodeProperty plugin=\"ws-cleanup@0.45\"/>\
            </nodeProperties>";
        let props = NodeProperties::from_element(&RawElement::parse(xml).unwrap()).unwrap();
        assert_eq!(
            props.properties[0],
            NodeProperty::disk_space_monitor("1GiB", "500MiB")
        );
        assert_eq!(
            props.properties[1],
            NodeProperty::WorkspaceCleanup(WorkspaceCleanup {
                plugin: Some("ws-cleanup@0.45".to_string()),
            })
        );

        let encoded = props.to_xml();
        assert!(encoded.contains("<hudson.node_monitors.DiskSpaceMonitorNodeProperty>"));
        assert!(encoded.contains("<hudson.plugins.ws_cleanup.DisableDeferredWipeoutNodeProperty"));
    }

    #[test]
    fn test_server_env_vars_with_whitespace() {
        let xml = r#"<nodeProperties>
  <hudson.slaves.EnvironmentVariablesNodeProperty>
    <envVars serialization="custom">
      <unserializable-parents/>
      <tree-map>
        <default>
          <comparator class="java.lang.String$CaseInsensitiveComparator"/>
        </default>
        <int>2</int>
        <string>K1</string>
        <string>V1</string>
        <string>K2</string>
        <string>V2</string>
      </tree-map>
    </envVars>
  </hudson.slaves.EnvironmentVariablesNodeProperty>
</nodeProperties>"#;
        let props = NodeProperties::from_element(&RawElement::parse(xml).unwrap()).unwrap();
        let vars = props.env_vars().unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(props.properties[0].env_var("K2"), Some("V2"));
    }

    #[test]
    fn test_empty_list() {
        let props = NodeProperties::default();
        assert_eq!(props.to_xml(), "<nodeProperties/>");
        assert_eq!(round_trip(&props), props);
    }
}
