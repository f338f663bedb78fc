//! Value type → wire descriptor resolution.
//!
//! Every transfer asks the registry for the [`WireDescriptor`] of its element
//! type. Types are described by providers ([`TypeDescriptorProvider`]) keyed by
//! [`TypeId`]; adding a type means registering one more provider, the lookup
//! itself never changes. Resolution order is fixed: scalar table, then
//! composite (pair) table, then [`DistError::UnsupportedType`].
//!
//! ```
//! use dist_seq::datatype::{resolve, ScalarKind, WireDescriptor};
//! assert_eq!(
//!     resolve::<i32>().unwrap(),
//!     WireDescriptor::Scalar { kind: ScalarKind::Signed, width: 4 }
//! );
//! ```

pub mod pairs;
pub mod wire;

use bytemuck::{NoUninit, Pod, Zeroable};
use dashmap::DashMap;
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::{TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::Arc;

use crate::dist_error::DistError;
pub use pairs::{DoubleInt, FloatInt, LongInt, ShortInt, TwoInt, ValueRankPair};

/// Primitive element families understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Signed,
    Unsigned,
    /// IEEE binary floating point; width 16 denotes the extended format.
    Float,
    /// Uninterpreted octets.
    Byte,
}

/// Transport-level layout of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireDescriptor {
    Scalar {
        kind: ScalarKind,
        width: usize,
    },
    /// A scalar value followed by an integer rank index.
    Pair {
        value_kind: ScalarKind,
        value_width: usize,
        index_width: usize,
        extent: usize,
    },
}

impl WireDescriptor {
    /// Distance in bytes between consecutive elements.
    pub fn extent(&self) -> usize {
        match *self {
            WireDescriptor::Scalar { width, .. } => width,
            WireDescriptor::Pair { extent, .. } => extent,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, WireDescriptor::Pair { .. })
    }

    /// Stable label, e.g. `"int32"` or `"double_int"`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

fn scalar_label(kind: ScalarKind, width: usize) -> String {
    match (kind, width) {
        (ScalarKind::Signed, w) => format!("int{}", w * 8),
        (ScalarKind::Unsigned, w) => format!("uint{}", w * 8),
        (ScalarKind::Float, 16) => "long_double".to_string(),
        (ScalarKind::Float, w) => format!("float{}", w * 8),
        (ScalarKind::Byte, 1) => "byte".to_string(),
        (ScalarKind::Byte, w) => format!("byte{w}"),
    }
}

impl fmt::Display for WireDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            WireDescriptor::Scalar { kind, width } => f.write_str(&scalar_label(kind, width)),
            WireDescriptor::Pair {
                value_kind,
                value_width,
                ..
            } => match (value_kind, value_width) {
                (ScalarKind::Float, 4) => f.write_str("float_int"),
                (ScalarKind::Float, 8) => f.write_str("double_int"),
                (ScalarKind::Float, 16) => f.write_str("long_double_int"),
                (ScalarKind::Signed, 2) => f.write_str("short_int"),
                (ScalarKind::Signed, 4) => f.write_str("2int"),
                (ScalarKind::Signed, 8) => f.write_str("long_int"),
                (kind, width) => write!(f, "{}_int", scalar_label(kind, width)),
            },
        }
    }
}

/// One raw octet, transported without interpretation.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct RawByte(pub u8);

/// Supplies the wire descriptor of exactly one Rust type.
pub trait TypeDescriptorProvider: Send + Sync {
    fn type_id(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
    /// `size_of` of the described type; must equal the descriptor extent,
    /// which must be nonzero.
    fn type_size(&self) -> usize;
    fn descriptor(&self) -> WireDescriptor;
}

/// Provider for a plain scalar whose width is its in-memory size.
///
/// `T` only has to be free of padding; types with invalid bit patterns such
/// as `bool` are checked when received.
pub struct ScalarProvider<T> {
    kind: ScalarKind,
    _marker: PhantomData<fn() -> T>,
}

impl<T: NoUninit> ScalarProvider<T> {
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            _marker: PhantomData,
        }
    }
}

impl<T: NoUninit> TypeDescriptorProvider for ScalarProvider<T> {
    fn type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
    fn type_size(&self) -> usize {
        size_of::<T>()
    }
    fn descriptor(&self) -> WireDescriptor {
        WireDescriptor::Scalar {
            kind: self.kind,
            width: size_of::<T>(),
        }
    }
}

/// Provider for a value + rank pair layout.
pub struct PairProvider<P>(PhantomData<fn() -> P>);

impl<P: ValueRankPair> PairProvider<P> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<P: ValueRankPair> Default for PairProvider<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ValueRankPair> TypeDescriptorProvider for PairProvider<P> {
    fn type_id(&self) -> TypeId {
        TypeId::of::<P>()
    }
    fn type_name(&self) -> &'static str {
        type_name::<P>()
    }
    fn type_size(&self) -> usize {
        size_of::<P>()
    }
    fn descriptor(&self) -> WireDescriptor {
        WireDescriptor::Pair {
            value_kind: P::VALUE_KIND,
            value_width: P::VALUE_WIDTH,
            index_width: size_of::<i32>(),
            extent: size_of::<P>(),
        }
    }
}

type ProviderTable = RwLock<HashMap<TypeId, Arc<dyn TypeDescriptorProvider>>>;

#[derive(Clone, Copy)]
enum Table {
    Scalar,
    Composite,
}

/// Open table of descriptor providers with a per-type resolution cache.
pub struct TypeRegistry {
    scalars: ProviderTable,
    composites: ProviderTable,
    cache: DashMap<TypeId, WireDescriptor>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("scalars", &self.scalars.read().len())
            .field("composites", &self.composites.read().len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl TypeRegistry {
    /// A registry that knows no types at all.
    pub fn empty() -> Self {
        Self {
            scalars: RwLock::new(HashMap::new()),
            composites: RwLock::new(HashMap::new()),
            cache: DashMap::new(),
        }
    }

    /// A registry pre-loaded with the built-in scalars and pair layouts.
    pub fn with_builtins() -> Self {
        let reg = Self::empty();
        {
            let mut s = reg.scalars.write();
            let mut put = |p: Arc<dyn TypeDescriptorProvider>| {
                s.insert(p.type_id(), p);
            };
            put(Arc::new(ScalarProvider::<bool>::new(ScalarKind::Unsigned)));
            put(Arc::new(ScalarProvider::<i8>::new(ScalarKind::Signed)));
            put(Arc::new(ScalarProvider::<i16>::new(ScalarKind::Signed)));
            put(Arc::new(ScalarProvider::<i32>::new(ScalarKind::Signed)));
            put(Arc::new(ScalarProvider::<i64>::new(ScalarKind::Signed)));
            put(Arc::new(ScalarProvider::<isize>::new(ScalarKind::Signed)));
            put(Arc::new(ScalarProvider::<u8>::new(ScalarKind::Unsigned)));
            put(Arc::new(ScalarProvider::<u16>::new(ScalarKind::Unsigned)));
            put(Arc::new(ScalarProvider::<u32>::new(ScalarKind::Unsigned)));
            put(Arc::new(ScalarProvider::<u64>::new(ScalarKind::Unsigned)));
            put(Arc::new(ScalarProvider::<usize>::new(ScalarKind::Unsigned)));
            put(Arc::new(ScalarProvider::<f32>::new(ScalarKind::Float)));
            put(Arc::new(ScalarProvider::<f64>::new(ScalarKind::Float)));
            put(Arc::new(ScalarProvider::<RawByte>::new(ScalarKind::Byte)));
        }
        {
            let mut c = reg.composites.write();
            let mut put = |p: Arc<dyn TypeDescriptorProvider>| {
                c.insert(p.type_id(), p);
            };
            put(Arc::new(PairProvider::<FloatInt>::new()));
            put(Arc::new(PairProvider::<DoubleInt>::new()));
            put(Arc::new(PairProvider::<ShortInt>::new()));
            put(Arc::new(PairProvider::<TwoInt>::new()));
            put(Arc::new(PairProvider::<LongInt>::new()));
        }
        reg
    }

    /// Add a scalar type. Existing entries are never replaced.
    pub fn register_scalar<P>(&self, provider: P) -> Result<(), DistError>
    where
        P: TypeDescriptorProvider + 'static,
    {
        self.register_into(Table::Scalar, Arc::new(provider))
    }

    /// Add a composite (pair) type. Existing entries are never replaced.
    pub fn register_composite<P>(&self, provider: P) -> Result<(), DistError>
    where
        P: TypeDescriptorProvider + 'static,
    {
        self.register_into(Table::Composite, Arc::new(provider))
    }

    fn register_into(
        &self,
        table: Table,
        provider: Arc<dyn TypeDescriptorProvider>,
    ) -> Result<(), DistError> {
        let extent = provider.descriptor().extent();
        if extent == 0 || extent != provider.type_size() {
            return Err(DistError::DescriptorWidth {
                type_name: provider.type_name(),
                extent,
                size: provider.type_size(),
            });
        }
        let id = provider.type_id();
        // Lock order: scalars, then composites.
        let mut scalars = self.scalars.write();
        let mut composites = self.composites.write();
        if scalars.contains_key(&id) || composites.contains_key(&id) {
            return Err(DistError::DuplicateDescriptor(provider.type_name()));
        }
        log::debug!(
            "registering wire descriptor {} for `{}`",
            provider.descriptor(),
            provider.type_name()
        );
        match table {
            Table::Scalar => scalars.insert(id, provider),
            Table::Composite => composites.insert(id, provider),
        };
        Ok(())
    }

    /// Resolve the descriptor of `T`.
    pub fn resolve<T: 'static>(&self) -> Result<WireDescriptor, DistError> {
        let id = TypeId::of::<T>();
        if let Some(hit) = self.cache.get(&id) {
            return Ok(*hit);
        }
        let found = self
            .scalars
            .read()
            .get(&id)
            .map(|p| p.descriptor())
            .or_else(|| self.composites.read().get(&id).map(|p| p.descriptor()))
            .ok_or(DistError::UnsupportedType(type_name::<T>()))?;
        self.cache.insert(id, found);
        Ok(found)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.scalars.read().contains_key(&id) || self.composites.read().contains_key(&id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.scalars.read().len() + self.composites.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

static REGISTRY: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::with_builtins);

/// The process-wide registry used by scatter and gather.
pub fn registry() -> &'static TypeRegistry {
    &REGISTRY
}

/// Resolve `T` against the process-wide registry.
pub fn resolve<T: 'static>() -> Result<WireDescriptor, DistError> {
    REGISTRY.resolve::<T>()
}
