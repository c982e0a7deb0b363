//! Composable type schemas.
//!
//! A schema is a rose tree: internal nodes are ordered sequences, leaves
//! reference a primitive with its arguments. Depth-first traversal yields
//! the primitive sequence the engine executes. Schemas are plain data; the
//! engine is the interpreter (no callables live in the tree).

use crate::error::Result;
use crate::primitive::{BitfieldSpec, Primitive};

/// A tree-shaped field descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// A single primitive leaf.
    Prim(Primitive),
    /// An ordered sequence of sub-schemas.
    Seq(Vec<Schema>),
}

impl Schema {
    pub fn seq(children: Vec<Schema>) -> Self {
        Schema::Seq(children)
    }

    pub fn u8() -> Self {
        Schema::Prim(Primitive::U8)
    }

    pub fn u16() -> Self {
        Schema::Prim(Primitive::U16)
    }

    pub fn u32() -> Self {
        Schema::Prim(Primitive::U32)
    }

    pub fn varuint32() -> Self {
        Schema::Prim(Primitive::VarUint32)
    }

    pub fn varint32() -> Self {
        Schema::Prim(Primitive::VarInt32)
    }

    pub fn bitfield(signed: bool, int_bits: u8, frac_bits: u8) -> Self {
        Schema::Prim(Primitive::Bitfield(BitfieldSpec {
            signed,
            int_bits,
            frac_bits,
        }))
    }

    pub fn name() -> Self {
        Schema::Prim(Primitive::Name)
    }

    pub fn fixed_bytes(n: usize) -> Self {
        Schema::Prim(Primitive::FixedBytes(n))
    }

    pub fn dyn_bytes() -> Self {
        Schema::Prim(Primitive::DynBytes)
    }

    /// Visit the leaves depth-first, stopping at the first error.
    pub fn for_each_primitive<F>(&self, f: &mut F) -> Result<()>
    where
        F: FnMut(Primitive) -> Result<()>,
    {
        match self {
            Schema::Prim(p) => f(*p),
            Schema::Seq(children) => {
                for child in children {
                    child.for_each_primitive(f)?;
                }
                Ok(())
            }
        }
    }

    /// Number of primitive leaves, i.e. the length of the value vector this
    /// schema decodes to.
    pub fn primitive_count(&self) -> usize {
        match self {
            Schema::Prim(_) => 1,
            Schema::Seq(children) => children.iter().map(Schema::primitive_count).sum(),
        }
    }
}
