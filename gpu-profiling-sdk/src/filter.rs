//! Name-classification rules used by the distribution builders.
//!
//! The rules are kept behind traits so the matching strategy (substring,
//! regex, structured tag) can be swapped without touching the aggregation
//! logic.

use regex::Regex;

/// Decides whether a calling-context function name denotes a logical
/// operator.
pub trait OpNameFilter {
    fn is_operator(&self, name: &str) -> bool;
}

/// Maps a calling-context function name to a model-layer label.
///
/// There is no canonical rule yet: layer labels are not present anywhere in
/// the snapshot, and deriving them from function-name conventions requires a
/// decision the snapshot producer has not made. Until then, callers that want
/// a layer distribution must bring their own rule; everything downstream of
/// this trait is implemented and tested.
pub trait LayerRule {
    /// Returns the layer label for the function, or `None` if the function
    /// does not belong to any layer.
    fn layer_of(&self, func_name: &str) -> Option<String>;
}

/// Placeholder operator rule: the name contains a fixed needle.
///
/// This mirrors the filter the profiling service shipped with (`"ops"`); it
/// is not a general operator-detection heuristic.
pub struct SubstringFilter {
    needle: String,
}

impl SubstringFilter {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

impl Default for SubstringFilter {
    fn default() -> Self {
        Self::new("ops")
    }
}

impl OpNameFilter for SubstringFilter {
    fn is_operator(&self, name: &str) -> bool {
        name.contains(&self.needle)
    }
}

/// Matches PyTorch dispatcher entry points, e.g. `at::_ops::mm::call(...)`.
pub struct TorchOpFilter {
    pattern: Regex,
}

impl TorchOpFilter {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"at::_ops::(\S+)::call(\S+)").expect("pattern is valid"),
        }
    }
}

impl Default for TorchOpFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl OpNameFilter for TorchOpFilter {
    fn is_operator(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

/// Matches TensorFlow op kernels, e.g. `tensorflow::MatMulOp<...>::Compute`.
pub struct TfOpFilter {
    pattern: Regex,
}

impl TfOpFilter {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(\S+)Op(Kernel)?.+::Compute").expect("pattern is valid"),
        }
    }
}

impl Default for TfOpFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl OpNameFilter for TfOpFilter {
    fn is_operator(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

impl<F> OpNameFilter for F
where
    F: Fn(&str) -> bool,
{
    fn is_operator(&self, name: &str) -> bool {
        self(name)
    }
}

impl<F> LayerRule for F
where
    F: Fn(&str) -> Option<String>,
{
    fn layer_of(&self, func_name: &str) -> Option<String> {
        self(func_name)
    }
}
