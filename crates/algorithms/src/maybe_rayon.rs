//! Row-parallel iteration that degrades to plain iterators.
//!
//! With the `parallel` feature this is `rayon::prelude`. Without it, the
//! `into_par_iter()` used by per-row stages resolves to `into_iter()`, so the
//! rest of the chain (`map`, `flat_map`, `collect`) is the std `Iterator` API
//! and results are identical either way.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
