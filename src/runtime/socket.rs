//! Buffer-backed data ports
//!
//! A [`Socket`] is a named, typed, fixed-size port on a task. Unlike a
//! streaming channel endpoint, a socket is plain shared memory: binding two
//! sockets makes them alias the same buffer, and a task reads or writes the
//! buffer contents synchronously when its codelet runs.
//!
//! Buffers are `Rc<RefCell<SocketBuffer>>` handles. Under the "owned"
//! allocation policy the task allocates them itself; under the "external"
//! policy a caller attaches a handle it manages. Either way, binding checks
//! that element kind and element count match on both sides.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use super::errors::PortError;

/// Direction of a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketDirection {
    Input,
    Output,
    InputOutput,
}

/// Element kind tag carried by every socket and buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    U8,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// Type-erased storage for one socket buffer
#[derive(Debug, Clone)]
pub enum SocketBuffer {
    U8(Vec<u8>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// Shared handle to a socket buffer
pub type BufferHandle = Rc<RefCell<SocketBuffer>>;

impl SocketBuffer {
    /// Allocate a zero-filled buffer of the given kind and element count
    pub fn zeroed(kind: ElementKind, len: usize) -> Self {
        match kind {
            ElementKind::U8 => SocketBuffer::U8(vec![0; len]),
            ElementKind::I8 => SocketBuffer::I8(vec![0; len]),
            ElementKind::I16 => SocketBuffer::I16(vec![0; len]),
            ElementKind::I32 => SocketBuffer::I32(vec![0; len]),
            ElementKind::I64 => SocketBuffer::I64(vec![0; len]),
            ElementKind::F32 => SocketBuffer::F32(vec![0.0; len]),
            ElementKind::F64 => SocketBuffer::F64(vec![0.0; len]),
        }
    }

    /// Wrap this buffer in a shareable handle
    pub fn into_handle(self) -> BufferHandle {
        Rc::new(RefCell::new(self))
    }

    /// Kind tag of the stored elements
    pub fn kind(&self) -> ElementKind {
        match self {
            SocketBuffer::U8(_) => ElementKind::U8,
            SocketBuffer::I8(_) => ElementKind::I8,
            SocketBuffer::I16(_) => ElementKind::I16,
            SocketBuffer::I32(_) => ElementKind::I32,
            SocketBuffer::I64(_) => ElementKind::I64,
            SocketBuffer::F32(_) => ElementKind::F32,
            SocketBuffer::F64(_) => ElementKind::F64,
        }
    }

    /// Number of stored elements
    pub fn len(&self) -> usize {
        match self {
            SocketBuffer::U8(v) => v.len(),
            SocketBuffer::I8(v) => v.len(),
            SocketBuffer::I16(v) => v.len(),
            SocketBuffer::I32(v) => v.len(),
            SocketBuffer::I64(v) => v.len(),
            SocketBuffer::F32(v) => v.len(),
            SocketBuffer::F64(v) => v.len(),
        }
    }

    /// True if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the elements in `range` as a comma-separated list, floats at
    /// the given precision. Used by the task debug traces.
    pub(crate) fn preview(&self, range: std::ops::Range<usize>, precision: usize) -> String {
        fn join_int<T: std::fmt::Display>(v: &[T], range: std::ops::Range<usize>) -> String {
            v[range]
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
        fn join_float<T: std::fmt::Display>(
            v: &[T],
            range: std::ops::Range<usize>,
            precision: usize,
        ) -> String {
            v[range]
                .iter()
                .map(|x| format!("{x:.precision$}"))
                .collect::<Vec<_>>()
                .join(", ")
        }
        match self {
            SocketBuffer::U8(v) => join_int(v, range),
            SocketBuffer::I8(v) => join_int(v, range),
            SocketBuffer::I16(v) => join_int(v, range),
            SocketBuffer::I32(v) => join_int(v, range),
            SocketBuffer::I64(v) => join_int(v, range),
            SocketBuffer::F32(v) => join_float(v, range, precision),
            SocketBuffer::F64(v) => join_float(v, range, precision),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Element types a socket can carry
pub trait Element: Copy + sealed::Sealed + 'static {
    /// Kind tag matching this element type
    const KIND: ElementKind;

    /// View a buffer as a slice of this type, if the kinds match
    fn slice(buf: &SocketBuffer) -> Option<&[Self]>;

    /// Mutable variant of [`Element::slice`]
    fn slice_mut(buf: &mut SocketBuffer) -> Option<&mut [Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const KIND: ElementKind = ElementKind::$variant;

            fn slice(buf: &SocketBuffer) -> Option<&[Self]> {
                match buf {
                    SocketBuffer::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(buf: &mut SocketBuffer) -> Option<&mut [Self]> {
                match buf {
                    SocketBuffer::$variant(v) => Some(v.as_mut_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(i8, I8);
impl_element!(i16, I16);
impl_element!(i32, I32);
impl_element!(i64, I64);
impl_element!(f32, F32);
impl_element!(f64, F64);

/// A named, typed, fixed-size port on a task
#[derive(Debug)]
pub struct Socket {
    name: String,
    kind: ElementKind,
    n_elmts: usize,
    direction: SocketDirection,
    buffer: Option<BufferHandle>,
}

impl Socket {
    pub(crate) fn new(
        name: String,
        kind: ElementKind,
        n_elmts: usize,
        direction: SocketDirection,
    ) -> Self {
        Self {
            name,
            kind,
            n_elmts,
            direction,
            buffer: None,
        }
    }

    /// Socket name, unique within its task
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element kind tag
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Declared element count (all frames included)
    pub fn n_elmts(&self) -> usize {
        self.n_elmts
    }

    /// Direction of this socket
    pub fn direction(&self) -> SocketDirection {
        self.direction
    }

    /// True once a buffer is attached or bound
    pub fn is_bound(&self) -> bool {
        self.buffer.is_some()
    }

    /// Share the current buffer handle, if any
    pub fn handle(&self) -> Option<BufferHandle> {
        self.buffer.clone()
    }

    /// Alias this socket to another socket's buffer.
    ///
    /// Element kind and element count must match and the other socket must
    /// itself be bound.
    pub fn bind(&mut self, other: &Socket) -> Result<(), PortError> {
        if other.kind != self.kind {
            return Err(PortError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                got: other.kind,
            });
        }
        if other.n_elmts != self.n_elmts {
            return Err(PortError::SizeMismatch {
                name: self.name.clone(),
                expected: self.n_elmts,
                got: other.n_elmts,
            });
        }
        let handle = other.buffer.clone().ok_or_else(|| PortError::Unbound {
            name: other.name.clone(),
        })?;
        self.buffer = Some(handle);
        Ok(())
    }

    /// Attach an externally managed buffer.
    ///
    /// The buffer's kind and length must match the socket declaration; its
    /// lifetime is the caller's responsibility.
    pub fn attach(&mut self, buffer: BufferHandle) -> Result<(), PortError> {
        {
            let b = buffer.borrow();
            if b.kind() != self.kind {
                return Err(PortError::KindMismatch {
                    name: self.name.clone(),
                    expected: self.kind,
                    got: b.kind(),
                });
            }
            if b.len() != self.n_elmts {
                return Err(PortError::SizeMismatch {
                    name: self.name.clone(),
                    expected: self.n_elmts,
                    got: b.len(),
                });
            }
        }
        self.buffer = Some(buffer);
        Ok(())
    }

    /// Drop the buffer handle, leaving the socket unbound
    pub fn unbind(&mut self) {
        self.buffer = None;
    }

    /// Allocate a fresh zeroed owned buffer matching the declaration
    pub(crate) fn alloc(&mut self) {
        self.buffer = Some(SocketBuffer::zeroed(self.kind, self.n_elmts).into_handle());
    }

    /// Immutable typed view of the buffer contents
    pub fn data<T: Element>(&self) -> Result<Ref<'_, [T]>, PortError> {
        let handle = self.buffer.as_ref().ok_or_else(|| PortError::Unbound {
            name: self.name.clone(),
        })?;
        Ref::filter_map(handle.borrow(), |b| T::slice(b)).map_err(|_| PortError::KindMismatch {
            name: self.name.clone(),
            expected: self.kind,
            got: T::KIND,
        })
    }

    /// Mutable typed view of the buffer contents
    pub fn data_mut<T: Element>(&self) -> Result<RefMut<'_, [T]>, PortError> {
        let handle = self.buffer.as_ref().ok_or_else(|| PortError::Unbound {
            name: self.name.clone(),
        })?;
        RefMut::filter_map(handle.borrow_mut(), |b| T::slice_mut(b)).map_err(|_| {
            PortError::KindMismatch {
                name: self.name.clone(),
                expected: self.kind,
                got: T::KIND,
            }
        })
    }
}

/// Ordered set of sockets belonging to one task
#[derive(Debug, Default)]
pub struct SocketSet {
    task: String,
    module: String,
    sockets: Vec<Socket>,
}

impl SocketSet {
    pub(crate) fn new(module: String, task: String) -> Self {
        Self {
            task,
            module,
            sockets: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, socket: Socket) {
        self.sockets.push(socket);
    }

    /// Number of sockets in the set
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    /// True if the set holds no sockets
    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    /// Iterate sockets in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Socket> {
        self.sockets.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Socket> {
        self.sockets.iter_mut()
    }

    /// True if a socket with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.sockets.iter().any(|s| s.name() == name)
    }

    /// Look up a socket by name
    pub fn get(&self, name: &str) -> Result<&Socket, PortError> {
        self.sockets
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| PortError::UnknownSocket {
                name: name.to_string(),
                task: self.task.clone(),
                module: self.module.clone(),
            })
    }

    /// Mutable variant of [`SocketSet::get`]
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Socket, PortError> {
        match self.sockets.iter_mut().find(|s| s.name() == name) {
            Some(s) => Ok(s),
            None => Err(PortError::UnknownSocket {
                name: name.to_string(),
                task: self.task.clone(),
                module: self.module.clone(),
            }),
        }
    }

    /// Typed read access to a named socket's buffer
    pub fn read<T: Element>(&self, name: &str) -> Result<Ref<'_, [T]>, PortError> {
        self.get(name)?.data::<T>()
    }

    /// Typed write access to a named socket's buffer
    pub fn write<T: Element>(&self, name: &str) -> Result<RefMut<'_, [T]>, PortError> {
        self.get(name)?.data_mut::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket(name: &str, kind: ElementKind, n: usize, dir: SocketDirection) -> Socket {
        Socket::new(name.to_string(), kind, n, dir)
    }

    #[test]
    fn test_zeroed_buffer_kind_and_len() {
        let buf = SocketBuffer::zeroed(ElementKind::F32, 16);
        assert_eq!(buf.kind(), ElementKind::F32);
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn test_typed_access_checks_kind() {
        let mut s = socket("x", ElementKind::F32, 4, SocketDirection::Output);
        s.alloc();
        assert!(s.data::<f32>().is_ok());
        assert!(matches!(
            s.data::<u8>(),
            Err(PortError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_unbound_access_fails() {
        let s = socket("x", ElementKind::F32, 4, SocketDirection::Input);
        assert!(matches!(s.data::<f32>(), Err(PortError::Unbound { .. })));
    }

    #[test]
    fn test_bind_shares_the_buffer() {
        let mut out = socket("out", ElementKind::I32, 8, SocketDirection::Output);
        out.alloc();
        let mut inp = socket("in", ElementKind::I32, 8, SocketDirection::Input);
        inp.bind(&out).unwrap();

        out.data_mut::<i32>().unwrap()[3] = 42;
        assert_eq!(inp.data::<i32>().unwrap()[3], 42);
    }

    #[test]
    fn test_bind_rejects_kind_and_size_mismatch() {
        let mut out = socket("out", ElementKind::I32, 8, SocketDirection::Output);
        out.alloc();

        let mut wrong_kind = socket("in", ElementKind::F32, 8, SocketDirection::Input);
        assert!(matches!(
            wrong_kind.bind(&out),
            Err(PortError::KindMismatch { .. })
        ));

        let mut wrong_size = socket("in", ElementKind::I32, 4, SocketDirection::Input);
        assert!(matches!(
            wrong_size.bind(&out),
            Err(PortError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_bind_to_unbound_socket_fails() {
        let out = socket("out", ElementKind::I32, 8, SocketDirection::Output);
        let mut inp = socket("in", ElementKind::I32, 8, SocketDirection::Input);
        assert!(matches!(inp.bind(&out), Err(PortError::Unbound { .. })));
    }

    #[test]
    fn test_attach_external_buffer() {
        let mut inp = socket("in", ElementKind::F64, 3, SocketDirection::Input);
        let buf = SocketBuffer::F64(vec![1.0, 2.0, 3.0]).into_handle();
        inp.attach(buf.clone()).unwrap();
        assert_eq!(&*inp.data::<f64>().unwrap(), &[1.0, 2.0, 3.0]);

        // writes through the external handle are visible to the socket
        if let SocketBuffer::F64(v) = &mut *buf.borrow_mut() {
            v[0] = -1.0;
        }
        assert_eq!(inp.data::<f64>().unwrap()[0], -1.0);
    }

    #[test]
    fn test_preview_formats_floats_with_precision() {
        let buf = SocketBuffer::F32(vec![1.0, -0.5, 0.25]);
        assert_eq!(buf.preview(0..2, 2), "1.00, -0.50");
        let ints = SocketBuffer::U8(vec![1, 0, 1]);
        assert_eq!(ints.preview(0..3, 2), "1, 0, 1");
    }
}
