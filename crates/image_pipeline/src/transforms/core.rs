use anyhow::{Context, Result};
use image::DynamicImage;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tch::Tensor;

/// Defines the core `Transform` trait for composable preprocessing pipelines.
///
/// A `Transform<I, O>` is a stateless (or internally synchronized) operation
/// converting an input of type `I` into an output of type `O`. Steps are
/// chained with `.then(...)` into a single statically dispatched pipeline.
///
/// Note: `then()` works only when:
/// 1. **Types align**: `self: Transform<I, O>`, `next: Transform<O, M>`
/// 2. **Owned**: `Self: Sized` (no trait objects, must be concrete)
/// 3. **Thread-safe**: intermediate and output types must be `Send`
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I) -> Result<O>;

    /// Appends the names of the steps this transform is made of.
    fn describe(&self, steps: &mut Vec<&'static str>) {
        steps.push(short_type_name::<Self>());
    }

    #[inline]
    fn then<T, M>(self, next: T) -> Chain<Self, T, O>
    where
        Self: Sized,
        T: Transform<O, M>,
        O: Send,
        M: Send,
    {
        Chain {
            first: self,
            second: next,
            _marker: PhantomData,
        }
    }
}

/// `path::to::Type<Generic>` -> `Type`
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A chain of two transforms (`A` -> `B`)
/// - `PhantomData<M>` enforces intermediate type alignment.
#[derive(Debug)]
pub struct Chain<A, B, M> {
    first: A,
    second: B,
    _marker: PhantomData<fn() -> M>,
}

impl<A, B, M> Chain<A, B, M> {
    /// Creates a new transform chain.
    /// Use [`Transform::then`] for better ergonomics.
    pub fn new(first: A, second: B) -> Self {
        Self {
            first,
            second,
            _marker: PhantomData,
        }
    }
}

impl<I, M, O, A, B> Transform<I, O> for Chain<A, B, M>
where
    A: Transform<I, M>,
    B: Transform<M, O>,
    M: Send,
{
    fn apply(&self, input: I) -> Result<O> {
        self.first
            .apply(input)
            .and_then(|mid| self.second.apply(mid))
            .with_context(|| {
                format!(
                    "Transform chain failed: {} → {} → {}",
                    short_type_name::<A>(),
                    short_type_name::<B>(),
                    short_type_name::<O>()
                )
            })
    }

    fn describe(&self, steps: &mut Vec<&'static str>) {
        self.first.describe(steps);
        self.second.describe(steps);
    }
}

// ============================================================================
// TransformPipeline
// ============================================================================

/// Type-erased image-to-tensor pipeline.
///
/// Train and eval pipelines are different concrete `Chain` types; this wrapper
/// lets both be returned from one function and shared across worker threads.
/// Cloning only bumps the `Arc`.
#[derive(Clone)]
pub struct TransformPipeline {
    inner: Arc<dyn Transform<DynamicImage, Tensor>>,
}

impl TransformPipeline {
    pub fn new(transform: impl Transform<DynamicImage, Tensor> + 'static) -> Self {
        Self {
            inner: Arc::new(transform),
        }
    }

    /// Step names in application order, e.g. `["Resize", "ToTensor", "Normalize"]`.
    pub fn steps(&self) -> Vec<&'static str> {
        let mut steps = Vec::new();
        self.inner.describe(&mut steps);
        steps
    }
}

impl Transform<DynamicImage, Tensor> for TransformPipeline {
    fn apply(&self, input: DynamicImage) -> Result<Tensor> {
        self.inner.apply(input)
    }

    fn describe(&self, steps: &mut Vec<&'static str>) {
        self.inner.describe(steps);
    }
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("steps", &self.steps())
            .finish()
    }
}
