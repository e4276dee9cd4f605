//! Typed attribute access on elements.
//!
//! Every write records a [`MutationKind::Attributes`] record, even when
//! the value does not change, matching how observers see `setAttribute`.

use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::NodeId;
use super::document::Document;
use super::mutation::MutationKind;
use super::node::Node;
use crate::error::{CoreError, Result};
use crate::logging::targets;

impl Document {
    /// Get an attribute value.
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)
            .and_then(Node::as_element)
            .and_then(|e| e.get_attr(name))
    }

    /// Check if an attribute is present.
    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Attribute names in insertion order.
    pub fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.node(node)
            .and_then(Node::as_element)
            .map(|e| e.attrs.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Set an attribute value.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let element = self
            .node_mut(node)
            .ok_or(CoreError::InvalidNode(node))?
            .as_element_mut()
            .ok_or(CoreError::NotAnElement(node))?;
        let old_value = element.set_attr(&name, value.into());
        self.record(
            node,
            MutationKind::Attributes {
                target: node,
                name,
                old_value,
            },
        );
        Ok(())
    }

    /// Remove an attribute. Returns `true` if it was present.
    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> Result<bool> {
        let name = name.to_ascii_lowercase();
        let element = self
            .node_mut(node)
            .ok_or(CoreError::InvalidNode(node))?
            .as_element_mut()
            .ok_or(CoreError::NotAnElement(node))?;
        let Some(old_value) = element.remove_attr(&name) else {
            return Ok(false);
        };
        self.record(
            node,
            MutationKind::Attributes {
                target: node,
                name,
                old_value: Some(old_value),
            },
        );
        Ok(true)
    }

    /// Read a boolean attribute.
    ///
    /// Present means `true` unless the value is literally `"false"`.
    pub fn attr_bool(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name)
            .is_some_and(|v| !v.trim().eq_ignore_ascii_case("false"))
    }

    /// Write a boolean attribute: `true` sets it empty, `false` removes it.
    pub fn set_attr_bool(&mut self, node: NodeId, name: &str, value: bool) -> Result<()> {
        if value {
            self.set_attr(node, name, "")
        } else {
            self.remove_attr(node, name).map(|_| ())
        }
    }

    /// Toggle a boolean attribute, optionally forcing a state.
    ///
    /// Returns whether the attribute is present afterwards.
    pub fn toggle_attr(&mut self, node: NodeId, name: &str, force: Option<bool>) -> Result<bool> {
        let present = force.unwrap_or(!self.has_attr(node, name));
        match (present, self.has_attr(node, name)) {
            (true, false) => self.set_attr(node, name, "")?,
            (false, true) => {
                self.remove_attr(node, name)?;
            }
            _ => {}
        }
        Ok(present)
    }

    /// Parse a numeric attribute. Missing or malformed values give `None`.
    pub fn attr_number<T: FromStr>(&self, node: NodeId, name: &str) -> Option<T> {
        self.attr(node, name).and_then(|v| v.trim().parse().ok())
    }

    /// Write a numeric attribute.
    pub fn set_attr_number<T: ToString>(&mut self, node: NodeId, name: &str, value: T) -> Result<()> {
        self.set_attr(node, name, value.to_string())
    }

    /// Parse a JSON attribute. Missing or malformed values give `None`.
    pub fn attr_json<T: DeserializeOwned>(&self, node: NodeId, name: &str) -> Option<T> {
        let raw = self.attr(node, name)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(
                    target: targets::DOM,
                    attribute = name,
                    error = %err,
                    "attribute is not valid JSON"
                );
                None
            }
        }
    }

    /// Serialize a value to JSON and store it as an attribute.
    pub fn set_attr_json<T: Serialize>(&mut self, node: NodeId, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(CoreError::Json)?;
        self.set_attr(node, name, json)
    }
}
