//! Objects that reference mesh vertices by raw index.
//!
//! Only the parts of the object graph the conversion has to patch are
//! modelled: vertex parenting and hook modifiers.

use crate::mesh::{Mesh, MeshId};

/// How an object is attached to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentType {
    /// Follows the parent object's transform.
    #[default]
    Object,
    /// Follows one vertex of the parent's mesh (`par[0]`).
    Vertex,
    /// Follows the triangle of three vertices of the parent's mesh.
    VertexTriple,
}

impl ParentType {
    /// Whether the `par` indices refer to mesh vertices.
    #[inline]
    pub fn uses_vertices(self) -> bool {
        matches!(self, ParentType::Vertex | ParentType::VertexTriple)
    }
}

/// Deforms a set of vertices with the transform of another object.
#[derive(Debug, Clone, PartialEq)]
pub struct HookModifier {
    /// Modifier name.
    pub name: String,
    /// Indices of the hooked vertices.
    pub indexar: Vec<usize>,
    /// Strength of the hook.
    pub force: f32,
}

impl HookModifier {
    /// A hook on the given vertices at full strength.
    pub fn new(name: impl Into<String>, indexar: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            indexar,
            force: 1.0,
        }
    }
}

/// A modifier in an object's stack.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// A hook modifier, whose vertex indices are remapped on conversion.
    Hook(HookModifier),
    /// Any other modifier. Carried along untouched.
    Other {
        /// Modifier name.
        name: String,
    },
}

/// An object in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Object name.
    pub name: String,
    /// The mesh this object uses, if any.
    pub data: Option<MeshId>,
    /// Index of the parent object in the document.
    pub parent: Option<usize>,
    /// How the object is attached to its parent.
    pub parent_type: ParentType,
    /// Parent vertex indices, used by vertex parenting.
    pub par: [usize; 3],
    /// Modifier stack.
    pub modifiers: Vec<Modifier>,
}

impl Object {
    /// An empty object with no data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
            parent: None,
            parent_type: ParentType::Object,
            par: [0; 3],
            modifiers: Vec::new(),
        }
    }

    /// An object using the given mesh.
    pub fn with_mesh(name: impl Into<String>, mesh: &Mesh) -> Self {
        Self {
            data: Some(mesh.id()),
            ..Self::new(name)
        }
    }

    /// Attach to a vertex (or vertex triangle) of the parent's mesh.
    pub fn with_vertex_parent(mut self, parent: usize, par: &[usize]) -> Self {
        debug_assert!(matches!(par.len(), 1 | 3));
        self.parent = Some(parent);
        self.parent_type = if par.len() == 3 {
            ParentType::VertexTriple
        } else {
            ParentType::Vertex
        };
        for (dst, &src) in self.par.iter_mut().zip(par) {
            *dst = src;
        }
        self
    }

    /// Append a modifier.
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Hook modifiers in stack order.
    pub fn hooks(&self) -> impl Iterator<Item = &HookModifier> + '_ {
        self.modifiers.iter().filter_map(|m| match m {
            Modifier::Hook(h) => Some(h),
            Modifier::Other { .. } => None,
        })
    }

    pub(crate) fn hooks_mut(&mut self) -> impl Iterator<Item = &mut HookModifier> + '_ {
        self.modifiers.iter_mut().filter_map(|m| match m {
            Modifier::Hook(h) => Some(h),
            Modifier::Other { .. } => None,
        })
    }
}

/// The collection of objects that may reference a mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    /// All objects.
    pub objects: Vec<Object>,
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, returning its index.
    pub fn add_object(&mut self, object: Object) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Indices of objects using the given mesh.
    pub fn users_of(&self, mesh: MeshId) -> impl Iterator<Item = usize> + '_ {
        self.objects
            .iter()
            .enumerate()
            .filter(move |(_, ob)| ob.data == Some(mesh))
            .map(|(i, _)| i)
    }
}
