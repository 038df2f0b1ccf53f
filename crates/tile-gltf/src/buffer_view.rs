//! Typed views over accessor data.
//!
//! Resolution never fails loudly: a missing buffer, an out-of-range offset or
//! an unsupported component type yields `None`, which callers treat as "the
//! attribute is absent".
//!
//! Typed data borrows the underlying buffer when the byte offset is suitably
//! aligned for the component type and copies it otherwise.

use std::borrow::Cow;
use std::collections::HashMap;

use bytemuck::Pod;
use indexmap::IndexMap;
use log::trace;

use crate::schema::{
    GltfDocument, GltfId, COMPONENT_FLOAT, COMPONENT_UNSIGNED_BYTE, COMPONENT_UNSIGNED_INT,
    COMPONENT_UNSIGNED_SHORT,
};

/// Component types the decoder can interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    /// Map a GL component type. Signed types are not supported.
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            COMPONENT_UNSIGNED_BYTE => Some(ComponentType::UnsignedByte),
            COMPONENT_UNSIGNED_SHORT => Some(ComponentType::UnsignedShort),
            COMPONENT_UNSIGNED_INT => Some(ComponentType::UnsignedInt),
            COMPONENT_FLOAT => Some(ComponentType::Float),
            _ => None,
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            ComponentType::UnsignedByte => 1,
            ComponentType::UnsignedShort => 2,
            ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }
}

/// Scalars stored little-endian in glTF buffers.
trait LeScalar: Pod {
    fn from_le(self) -> Self;
}

impl LeScalar for u8 {
    fn from_le(self) -> Self {
        self
    }
}

impl LeScalar for u16 {
    fn from_le(self) -> Self {
        u16::from_le(self)
    }
}

impl LeScalar for u32 {
    fn from_le(self) -> Self {
        u32::from_le(self)
    }
}

impl LeScalar for f32 {
    fn from_le(self) -> Self {
        f32::from_bits(u32::from_le(self.to_bits()))
    }
}

/// Reinterpret little-endian bytes, borrowing when alignment allows.
fn cast_le<T: LeScalar>(bytes: &[u8]) -> Cow<'_, [T]> {
    let usable = bytes.len() - bytes.len() % std::mem::size_of::<T>();
    let bytes = &bytes[..usable];

    let values: Cow<'_, [T]> = match bytemuck::try_cast_slice::<u8, T>(bytes) {
        Ok(values) => Cow::Borrowed(values),
        Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(bytes)),
    };

    if cfg!(target_endian = "big") {
        Cow::Owned(values.iter().map(|v| v.from_le()).collect())
    } else {
        values
    }
}

fn widen<'a, S: Copy, T: Clone + From<S>>(values: &[S]) -> Cow<'a, [T]> {
    Cow::Owned(values.iter().map(|&v| T::from(v)).collect())
}

/// Typed element data with a stride expressed in components.
#[derive(Debug, Clone)]
pub struct TypedData<'a, T: Clone> {
    values: Cow<'a, [T]>,
    /// Distance between consecutive elements, in components.
    pub stride: usize,
    /// Number of elements.
    pub count: usize,
    /// Components per element.
    pub components: usize,
}

impl<'a, T: Copy> TypedData<'a, T> {
    /// Component `component` of element `element`.
    pub fn get(&self, element: usize, component: usize) -> Option<T> {
        if element >= self.count || component >= self.components {
            return None;
        }
        self.values.get(element * self.stride + component).copied()
    }

    /// True if the data borrows the source buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.values, Cow::Borrowed(_))
    }
}

/// A resolved accessor: element layout plus the bytes backing it.
#[derive(Debug, Clone)]
pub struct BufferView<'a> {
    pub count: usize,
    pub component_type: ComponentType,
    /// Components per element.
    pub components: usize,
    /// Distance between consecutive elements, in components.
    pub stride: usize,
    /// Bytes from the first element through the end of the view.
    bytes: &'a [u8],
}

impl<'a> BufferView<'a> {
    fn typed<T: LeScalar>(&self) -> TypedData<'a, T> {
        TypedData {
            values: cast_le(self.bytes),
            stride: self.stride,
            count: self.count,
            components: self.components,
        }
    }

    fn widened<S: LeScalar, T: Copy + From<S>>(&self) -> TypedData<'a, T> {
        let source = cast_le::<S>(self.bytes);
        TypedData {
            values: widen(&source),
            stride: self.stride,
            count: self.count,
            components: self.components,
        }
    }

    /// Float data. Only float storage satisfies a float request.
    pub fn as_f32(&self) -> Option<TypedData<'a, f32>> {
        match self.component_type {
            ComponentType::Float => Some(self.typed()),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<TypedData<'a, u8>> {
        match self.component_type {
            ComponentType::UnsignedByte => Some(self.typed()),
            _ => None,
        }
    }

    /// 16-bit data, widening 8-bit storage.
    pub fn as_u16(&self) -> Option<TypedData<'a, u16>> {
        match self.component_type {
            ComponentType::UnsignedShort => Some(self.typed()),
            ComponentType::UnsignedByte => Some(self.widened::<u8, u16>()),
            _ => None,
        }
    }

    /// 32-bit data, widening 8- and 16-bit storage.
    pub fn as_u32(&self) -> Option<TypedData<'a, u32>> {
        match self.component_type {
            ComponentType::UnsignedInt => Some(self.typed()),
            ComponentType::UnsignedShort => Some(self.widened::<u16, u32>()),
            ComponentType::UnsignedByte => Some(self.widened::<u8, u32>()),
            ComponentType::Float => None,
        }
    }

}

/// Resolves accessors against a document and its resolved buffers.
#[derive(Clone, Copy)]
pub struct BufferViewResolver<'a> {
    document: &'a GltfDocument,
    buffers: &'a HashMap<GltfId, Vec<u8>>,
}

impl<'a> BufferViewResolver<'a> {
    pub fn new(document: &'a GltfDocument, buffers: &'a HashMap<GltfId, Vec<u8>>) -> Self {
        Self { document, buffers }
    }

    pub fn document(&self) -> &'a GltfDocument {
        self.document
    }

    /// Resolve the accessor that `json[name]` refers to.
    pub fn resolve_named(
        &self,
        json: &IndexMap<String, GltfId>,
        name: &str,
    ) -> Option<BufferView<'a>> {
        self.resolve(json.get(name)?)
    }

    /// Resolve an accessor by id.
    pub fn resolve(&self, accessor_id: &GltfId) -> Option<BufferView<'a>> {
        let view = self.try_resolve(accessor_id);
        if view.is_none() {
            trace!("accessor {} is unresolved", accessor_id);
        }
        view
    }

    fn try_resolve(&self, accessor_id: &GltfId) -> Option<BufferView<'a>> {
        let accessor = self.document.accessors.get(accessor_id)?;
        let buffer_view = self.document.buffer_views.get(accessor.buffer_view.as_ref()?)?;
        let buffer = self.buffers.get(&buffer_view.buffer)?;

        let component_type = ComponentType::from_gl(accessor.component_type)?;
        let component_size = component_type.byte_size();
        let components = accessor.component_count();
        let element_size = components * component_size;

        let byte_stride = buffer_view
            .byte_stride
            .or(accessor.byte_stride)
            .filter(|&stride| stride != 0)
            .unwrap_or(element_size);
        if byte_stride < element_size || byte_stride % component_size != 0 {
            return None;
        }

        let offset = buffer_view.byte_offset.checked_add(accessor.byte_offset)?;
        if accessor.count == 0 {
            return Some(BufferView {
                count: 0,
                component_type,
                components,
                stride: byte_stride / component_size,
                bytes: &[],
            });
        }

        // The last element need not be padded out to a full stride.
        let required = byte_stride
            .checked_mul(accessor.count - 1)?
            .checked_add(element_size)?;
        let end = offset.checked_add(required)?;
        if end > buffer.len() {
            return None;
        }
        let full_end = offset
            .checked_add(byte_stride.checked_mul(accessor.count)?)?
            .min(buffer.len());

        Some(BufferView {
            count: accessor.count,
            component_type,
            components,
            stride: byte_stride / component_size,
            bytes: &buffer[offset..full_end],
        })
    }

    /// Raw bytes of a buffer view, for embedded images and compressed data.
    pub fn raw_view(&self, buffer_view_id: &GltfId) -> Option<&'a [u8]> {
        let view = self.document.buffer_views.get(buffer_view_id)?;
        let buffer = self.buffers.get(&view.buffer)?;
        let end = view.byte_offset.checked_add(view.byte_length)?;
        buffer.get(view.byte_offset..end)
    }
}
