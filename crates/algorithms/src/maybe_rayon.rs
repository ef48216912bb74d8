/// Row-parallel iteration with or without rayon.
///
/// With the `parallel` feature this re-exports rayon's prelude. Without it,
/// `into_par_iter()` falls back to `into_iter()` so the same iterator
/// chains (`flat_map`, `map`, `collect`) compile sequentially.
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
