//! Node parameters
//!
//! Parameters are a closed heterogeneous variant validated on set and on
//! compile, never introspected beyond the declared type. The declared type
//! of a descriptor is the variant of its default value, so a descriptor
//! cannot be constructed with a type/default disagreement.

use crate::graph::GraphError;
use ash::vk;
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use std::collections::HashMap;

/// Closed set of parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// 32-bit signed integer
    I32,
    /// 32-bit unsigned integer
    U32,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Boolean
    Bool,
    /// String
    String,
    /// Two-component float vector
    Vec2,
    /// Three-component float vector
    Vec3,
    /// Four-component float vector
    Vec4,
    /// 4x4 float matrix
    Mat4,
    /// Attachment load operation
    LoadOp,
    /// Attachment store operation
    StoreOp,
    /// Depth attachment format
    DepthFormat,
    /// Image layout
    ImageLayout,
    /// Opaque descriptor-layout reference
    DescriptorLayout,
}

/// A parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// 32-bit signed integer
    I32(i32),
    /// 32-bit unsigned integer
    U32(u32),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Boolean
    Bool(bool),
    /// String
    String(String),
    /// Two-component float vector
    Vec2(Vector2<f32>),
    /// Three-component float vector
    Vec3(Vector3<f32>),
    /// Four-component float vector
    Vec4(Vector4<f32>),
    /// 4x4 float matrix
    Mat4(Matrix4<f32>),
    /// Attachment load operation
    LoadOp(vk::AttachmentLoadOp),
    /// Attachment store operation
    StoreOp(vk::AttachmentStoreOp),
    /// Depth attachment format
    DepthFormat(vk::Format),
    /// Image layout
    ImageLayout(vk::ImageLayout),
    /// Opaque descriptor-layout reference
    DescriptorLayout(u64),
}

impl ParameterValue {
    /// Type tag of this value's variant
    pub const fn parameter_type(&self) -> ParameterType {
        match self {
            Self::I32(_) => ParameterType::I32,
            Self::U32(_) => ParameterType::U32,
            Self::F32(_) => ParameterType::F32,
            Self::F64(_) => ParameterType::F64,
            Self::Bool(_) => ParameterType::Bool,
            Self::String(_) => ParameterType::String,
            Self::Vec2(_) => ParameterType::Vec2,
            Self::Vec3(_) => ParameterType::Vec3,
            Self::Vec4(_) => ParameterType::Vec4,
            Self::Mat4(_) => ParameterType::Mat4,
            Self::LoadOp(_) => ParameterType::LoadOp,
            Self::StoreOp(_) => ParameterType::StoreOp,
            Self::DepthFormat(_) => ParameterType::DepthFormat,
            Self::ImageLayout(_) => ParameterType::ImageLayout,
            Self::DescriptorLayout(_) => ParameterType::DescriptorLayout,
        }
    }

    /// The unsigned integer value, if that is the variant
    pub const fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// The boolean value, if that is the variant
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if that is the variant
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The four-component vector value, if that is the variant
    pub const fn as_vec4(&self) -> Option<Vector4<f32>> {
        match self {
            Self::Vec4(v) => Some(*v),
            _ => None,
        }
    }

    /// The load-op value, if that is the variant
    pub const fn as_load_op(&self) -> Option<vk::AttachmentLoadOp> {
        match self {
            Self::LoadOp(v) => Some(*v),
            _ => None,
        }
    }

    /// The store-op value, if that is the variant
    pub const fn as_store_op(&self) -> Option<vk::AttachmentStoreOp> {
        match self {
            Self::StoreOp(v) => Some(*v),
            _ => None,
        }
    }

    /// The depth-format value, if that is the variant
    pub const fn as_depth_format(&self) -> Option<vk::Format> {
        match self {
            Self::DepthFormat(v) => Some(*v),
            _ => None,
        }
    }

    /// The image-layout value, if that is the variant
    pub const fn as_image_layout(&self) -> Option<vk::ImageLayout> {
        match self {
            Self::ImageLayout(v) => Some(*v),
            _ => None,
        }
    }
}

/// Static description of one parameter
///
/// The declared type is the variant of the default, so the two cannot
/// disagree.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Parameter name, unique within the node type
    pub name: String,
    /// Whether the user must set the parameter explicitly before compile
    pub required: bool,
    /// Default value; its variant is the declared type
    pub default: ParameterValue,
}

impl ParameterDescriptor {
    /// Describe a parameter
    pub fn new(name: &str, default: ParameterValue, required: bool) -> Self {
        Self { name: name.to_string(), required, default }
    }

    /// Declared type of the parameter
    pub const fn parameter_type(&self) -> ParameterType {
        self.default.parameter_type()
    }
}

/// Concrete parameter values of one node instance
///
/// Reads fall back to the descriptor default; writes are validated against
/// the declared type.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    values: HashMap<String, ParameterValue>,
}

impl ParameterSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, validating its variant against the descriptor
    pub fn set(
        &mut self,
        descriptors: &[ParameterDescriptor],
        node: &str,
        name: &str,
        value: ParameterValue,
    ) -> Result<(), GraphError> {
        let descriptor = descriptors
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| GraphError::UnknownParameter {
                node: node.to_string(),
                name: name.to_string(),
            })?;

        let expected = descriptor.parameter_type();
        let got = value.parameter_type();
        if expected != got {
            return Err(GraphError::ParameterTypeMismatch {
                name: name.to_string(),
                expected,
                got,
            });
        }

        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Whether the parameter was explicitly set
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Read a value, falling back to the descriptor default
    ///
    /// Returns `None` for names the node type does not declare.
    pub fn get<'a>(
        &'a self,
        descriptors: &'a [ParameterDescriptor],
        name: &str,
    ) -> Option<&'a ParameterValue> {
        if let Some(value) = self.values.get(name) {
            return Some(value);
        }
        descriptors.iter().find(|d| d.name == name).map(|d| &d.default)
    }

    /// Verify every required parameter has an explicit value
    pub fn validate_required(
        &self,
        descriptors: &[ParameterDescriptor],
        node: &str,
    ) -> Result<(), GraphError> {
        for descriptor in descriptors {
            if descriptor.required && !self.is_set(&descriptor.name) {
                return Err(GraphError::ParameterMissing {
                    node: node.to_string(),
                    name: descriptor.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<ParameterDescriptor> {
        vec![
            ParameterDescriptor::new("width", ParameterValue::U32(1280), false),
            ParameterDescriptor::new("label", ParameterValue::String(String::new()), true),
            ParameterDescriptor::new(
                "load_op",
                ParameterValue::LoadOp(vk::AttachmentLoadOp::CLEAR),
                false,
            ),
        ]
    }

    #[test]
    fn set_validates_variant_against_declared_type() {
        let descriptors = descriptors();
        let mut params = ParameterSet::new();

        params
            .set(&descriptors, "n", "width", ParameterValue::U32(1920))
            .unwrap();

        let err = params
            .set(&descriptors, "n", "width", ParameterValue::F32(1920.0))
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::ParameterTypeMismatch {
                expected: ParameterType::U32,
                got: ParameterType::F32,
                ..
            }
        ));

        let err = params
            .set(&descriptors, "n", "missing", ParameterValue::U32(0))
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownParameter { .. }));
    }

    #[test]
    fn get_falls_back_to_default() {
        let descriptors = descriptors();
        let mut params = ParameterSet::new();
        assert_eq!(
            params.get(&descriptors, "width").and_then(ParameterValue::as_u32),
            Some(1280)
        );

        params
            .set(&descriptors, "n", "width", ParameterValue::U32(640))
            .unwrap();
        assert_eq!(
            params.get(&descriptors, "width").and_then(ParameterValue::as_u32),
            Some(640)
        );
        assert!(params.get(&descriptors, "nonexistent").is_none());
    }

    #[test]
    fn required_parameters_must_be_set() {
        let descriptors = descriptors();
        let mut params = ParameterSet::new();
        let err = params.validate_required(&descriptors, "n").unwrap_err();
        assert!(matches!(err, GraphError::ParameterMissing { .. }));

        params
            .set(&descriptors, "n", "label", ParameterValue::String("main".into()))
            .unwrap();
        params.validate_required(&descriptors, "n").unwrap();
    }
}
