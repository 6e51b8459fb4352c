use std::{fmt, sync::Arc};

use crate::device::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    Int,
}

impl AttrType {
    /// Number of 32-bit components.
    pub fn components(self) -> u32 {
        match self {
            AttrType::Float | AttrType::Int => 1,
            AttrType::Vec2 => 2,
            AttrType::Vec3 => 3,
            AttrType::Vec4 | AttrType::Mat2 => 4,
            AttrType::Mat3 => 9,
            AttrType::Mat4 => 16,
        }
    }

    pub fn size(self) -> usize {
        self.components() as usize * 4
    }

    /// Whether a vertex array can source this type as a float vector.
    pub fn is_vertex_vector(self) -> bool {
        matches!(
            self,
            AttrType::Float | AttrType::Vec2 | AttrType::Vec3 | AttrType::Vec4
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: String,
    pub ty: AttrType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered vertex attribute layout. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrFormat(Arc<[Attribute]>);

impl AttrFormat {
    pub fn new(attributes: impl IntoIterator<Item = Attribute>) -> Self {
        Self(attributes.into_iter().collect())
    }

    /// Total bytes per vertex.
    pub fn size(&self) -> usize {
        self.0.iter().map(|a| a.ty.size()).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.name.as_str())
    }
}

impl<'a> IntoIterator for &'a AttrFormat {
    type Item = &'a Attribute;
    type IntoIter = std::slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for AttrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, attr) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", attr.name, attr.ty)?;
        }
        f.write_str("]")
    }
}

/// A linked program and the vertex layout it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shader {
    handle: Handle,
    format: AttrFormat,
}

impl Shader {
    pub fn new(handle: Handle, format: AttrFormat) -> Self {
        Self { handle, format }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn vertex_format(&self) -> &AttrFormat {
        &self.format
    }
}
