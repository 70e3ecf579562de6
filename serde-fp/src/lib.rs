//! Serialize function pointers so they can be shipped to another process running
//! the same binary.
//!
//! A pointer is written as its offset from an anchor symbol. Code and the anchor
//! are relocated together when the binary is loaded, so the offset stays valid
//! in every process started from the same executable.

use std::fmt;
use std::mem::{size_of, transmute_copy};

use lazy_static::lazy_static;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[doc(hidden)]
#[used]
#[no_mangle]
static SERDE_FP_ANCHOR: u8 = 0;

lazy_static! {
    static ref ANCHOR: usize = &SERDE_FP_ANCHOR as *const u8 as usize;
}

/// Plain Rust function pointers which can travel as an offset.
pub trait FunctionPointer: Copy + Send + Sync + 'static {
    fn addr(self) -> usize;

    /// # Safety
    /// `addr` must come from [`FunctionPointer::addr`] on a pointer of exactly
    /// this type, in a process running the same binary.
    unsafe fn from_addr(addr: usize) -> Self;
}

macro_rules! impl_function_pointer {
    ($($fn_ty:ty => [$($generic:ident),*];)*) => {
        $(
            impl<$($generic: 'static),*> FunctionPointer for $fn_ty {
                #[inline]
                fn addr(self) -> usize {
                    self as usize
                }

                #[inline]
                unsafe fn from_addr(addr: usize) -> Self {
                    debug_assert_eq!(size_of::<Self>(), size_of::<usize>());
                    transmute_copy::<usize, Self>(&addr)
                }
            }
        )*
    };
}

impl_function_pointer! {
    fn() -> R => [R];
    fn(A) -> R => [R, A];
    fn(&A) -> R => [R, A];
    fn(A, B) -> R => [R, A, B];
    fn(&A, B) -> R => [R, A, B];
    fn(&A, &B) -> R => [R, A, B];
    fn(A, B, C) -> R => [R, A, B, C];
    fn(&A, B, C) -> R => [R, A, B, C];
    fn(A, B, C, D) -> R => [R, A, B, C, D];
}

/// Offset of `f` from the anchor. Stable across processes of the same binary.
pub fn offset_of<F: FunctionPointer>(f: F) -> u64 {
    f.addr().wrapping_sub(*ANCHOR) as u64
}

/// # Safety
/// `offset` must have been produced by [`offset_of`] for a pointer of type `F`
/// in a process running the same binary.
pub unsafe fn resolve<F: FunctionPointer>(offset: u64) -> F {
    F::from_addr((offset as usize).wrapping_add(*ANCHOR))
}

/// Use with `#[serde(with = "serde_fp")]`.
pub fn serialize<F: FunctionPointer, S>(f: &F, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    offset_of(*f).serialize(s)
}

/// Use with `#[serde(with = "serde_fp")]`.
pub fn deserialize<'de, F: FunctionPointer, D>(d: D) -> Result<F, D::Error>
where
    D: Deserializer<'de>,
{
    let offset = u64::deserialize(d)?;
    // offsets are only ever produced by `serialize` from the same binary
    Ok(unsafe { resolve(offset) })
}

/// Function pointer usable as a plain serde value, e.g. when it is one of
/// several named values captured next to other data.
#[derive(Clone, Copy)]
pub struct Fp<F>(pub F);

impl<F: FunctionPointer> fmt::Debug for Fp<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp({:#x})", offset_of(self.0))
    }
}

impl<F: FunctionPointer> Serialize for Fp<F> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        serialize(&self.0, s)
    }
}

impl<'de, F: FunctionPointer> Deserialize<'de> for Fp<F> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        deserialize(d).map(Fp)
    }
}
