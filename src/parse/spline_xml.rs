//! XML form of a spline.
//!
//! ```xml
//! <spline loop="true">
//!   <node>
//!     <position x="0" y="0" z="0"/>
//!     <direction x="1" y="0" z="0"/>
//!     <up x="0" y="1" z="0"/>
//!     <scale x="1" y="1"/>
//!     <roll value="0"/>
//!   </node>
//!   ...
//! </spline>
//! ```
//!
//! `loop`, `<up>`, `<scale>` and `<roll>` are optional. Only the nodes and the
//! loop flag are stored; curve resolution is a runtime setting.

use quick_xml::de::from_str;
use quick_xml::se::to_string_with_root;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::{Point3, Spline, SplineError, SplineNode, Vec2, Vec3};

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("invalid spline: {0}")]
    Spline(#[from] SplineError),
    #[error("node {index} contains non-finite values")]
    NonFiniteNode { index: usize },
}

/// Reads a `<spline>` document.
pub fn parse_str(input: &str) -> ParseResult<Spline> {
    let document: XmlSpline = from_str(input)?;
    log::debug!(
        "parsed spline document: {} nodes, loop={}",
        document.nodes.len(),
        document.is_loop
    );

    let nodes = document
        .nodes
        .into_iter()
        .enumerate()
        .map(|(index, node)| {
            let node = SplineNode::from(node);
            if node.is_finite() {
                Ok(node)
            } else {
                Err(ParseError::NonFiniteNode { index })
            }
        })
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(Spline::new(nodes)?.looped(document.is_loop))
}

/// Writes `spline` as a `<spline>` document.
pub fn to_string(spline: &Spline) -> ParseResult<String> {
    let document = XmlSpline {
        is_loop: spline.is_loop(),
        nodes: spline.nodes().iter().map(XmlNode::from).collect(),
    };
    Ok(to_string_with_root("spline", &document)?)
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlSpline {
    #[serde(default, rename = "@loop")]
    is_loop: bool,
    #[serde(default, rename = "node")]
    nodes: Vec<XmlNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlNode {
    position: XmlVec3,
    direction: XmlVec3,
    #[serde(default = "XmlVec3::up")]
    up: XmlVec3,
    #[serde(default = "XmlVec2::one")]
    scale: XmlVec2,
    #[serde(default)]
    roll: XmlScalar,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct XmlScalar {
    #[serde(rename = "@value")]
    value: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct XmlVec3 {
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
    #[serde(rename = "@z")]
    z: f64,
}

impl XmlVec3 {
    const fn up() -> Self {
        Self {
            x: 0.0,
            y: 1.0,
            z: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct XmlVec2 {
    #[serde(rename = "@x")]
    x: f64,
    #[serde(rename = "@y")]
    y: f64,
}

impl XmlVec2 {
    const fn one() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

impl From<XmlNode> for SplineNode {
    fn from(node: XmlNode) -> Self {
        let XmlNode {
            position: p,
            direction: d,
            up: u,
            scale: s,
            roll,
        } = node;
        Self::new(Point3::new(p.x, p.y, p.z), Point3::new(d.x, d.y, d.z))
            .with_up(Vec3::new(u.x, u.y, u.z))
            .with_scale(Vec2::new(s.x, s.y))
            .with_roll(roll.value)
    }
}

impl From<&SplineNode> for XmlNode {
    fn from(node: &SplineNode) -> Self {
        let point = |p: Point3| XmlVec3 {
            x: p.x,
            y: p.y,
            z: p.z,
        };
        Self {
            position: point(node.position),
            direction: point(node.direction),
            up: XmlVec3 {
                x: node.up.x,
                y: node.up.y,
                z: node.up.z,
            },
            scale: XmlVec2 {
                x: node.scale.x,
                y: node.scale.y,
            },
            roll: XmlScalar { value: node.roll },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_NODES: &str = r#"
        <spline>
          <node>
            <position x="0" y="0" z="0"/>
            <direction x="1" y="0" z="0"/>
          </node>
          <node>
            <position x="10" y="0" z="0"/>
            <direction x="11" y="0" z="0"/>
            <up x="0" y="0" z="1"/>
            <scale x="2" y="0.5"/>
            <roll value="45"/>
          </node>
        </spline>
    "#;

    #[test]
    fn parses_minimal_spline_with_defaults() {
        let spline = parse_str(TWO_NODES).unwrap();
        assert_eq!(spline.node_count(), 2);
        assert!(!spline.is_loop());

        let first = spline.nodes()[0];
        assert_eq!(first.up, Vec3::Y);
        assert_eq!(first.scale, Vec2::ONE);
        assert_eq!(first.roll, 0.0);

        let second = spline.nodes()[1];
        assert_eq!(second.up, Vec3::Z);
        assert_eq!(second.scale, Vec2::new(2.0, 0.5));
        assert_eq!(second.roll, 45.0);
        assert!((spline.length() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn parses_loop_flag() {
        let xml = TWO_NODES.replacen("<spline>", r#"<spline loop="true">"#, 1);
        let spline = parse_str(&xml).unwrap();
        assert!(spline.is_loop());
        assert_eq!(spline.curve_count(), 2);
    }

    #[test]
    fn rejects_single_node() {
        let xml = r#"<spline><node><position x="0" y="0" z="0"/><direction x="1" y="0" z="0"/></node></spline>"#;
        assert!(matches!(
            parse_str(xml),
            Err(ParseError::Spline(SplineError::InvariantViolation { node_count: 1 }))
        ));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let xml = TWO_NODES.replacen(r#"x="10""#, r#"x="ten""#, 1);
        assert!(matches!(parse_str(&xml), Err(ParseError::Xml(_))));
    }

    #[test]
    fn rejects_non_finite_nodes() {
        let xml = TWO_NODES.replacen(r#"x="10""#, r#"x="NaN""#, 1);
        assert!(matches!(
            parse_str(&xml),
            Err(ParseError::NonFiniteNode { index: 1 })
        ));
    }

    #[test]
    fn written_document_reads_back() {
        let mut spline = parse_str(TWO_NODES).unwrap();
        spline.set_loop(true);
        spline.add_node_after(1).unwrap();

        let xml = to_string(&spline).unwrap();
        assert!(xml.starts_with("<spline"));
        let back = parse_str(&xml).unwrap();
        assert_eq!(back.nodes(), spline.nodes());
        assert!(back.is_loop());
        assert_eq!(back.length(), spline.length());
    }
}
