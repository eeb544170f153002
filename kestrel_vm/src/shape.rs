//! Operation shapes: the keys of the dispatch cache.
//!
//! Two call sites with equal shapes share one binder instance. Each operation
//! kind has its own key type:
//!
//! | kind             | key                                   |
//! |------------------|---------------------------------------|
//! | get/set member   | [`MemberKey`]                         |
//! | get/set index    | [`CallShape`]                         |
//! | invoke           | [`CallShape`]                         |
//! | invoke member    | [`InvokeMemberKey`]                   |
//! | binary operator  | [`BinaryKey`]                         |
//! | unary operator   | [`UnaryOperator`]                     |
//! | convert          | destination [`kestrel_runtime::HostType`] |

use std::fmt;
use std::sync::Arc;

use crate::operator::{BinaryOperator, UnaryOperator};

// =============================================================================
// Call Shape
// =============================================================================

/// Argument shape of an index or call operation.
///
/// Named arguments, when present, are the trailing `argument_names.len()`
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallShape {
    argument_count: usize,
    argument_names: Arc<[Arc<str>]>,
}

impl CallShape {
    /// Shape with `argument_count` positional arguments.
    pub fn positional(argument_count: usize) -> Self {
        Self {
            argument_count,
            argument_names: Arc::from(Vec::<Arc<str>>::new()),
        }
    }

    /// Shape whose trailing arguments are named.
    ///
    /// # Panics
    ///
    /// Panics if there are more names than arguments.
    pub fn named<I, S>(argument_count: usize, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let argument_names: Arc<[Arc<str>]> = names.into_iter().map(Into::into).collect();
        assert!(
            argument_names.len() <= argument_count,
            "call shape has {} names for {} arguments",
            argument_names.len(),
            argument_count
        );
        Self {
            argument_count,
            argument_names,
        }
    }

    #[inline]
    pub fn argument_count(&self) -> usize {
        self.argument_count
    }

    #[inline]
    pub fn argument_names(&self) -> &[Arc<str>] {
        &self.argument_names
    }

    /// Number of leading positional arguments.
    #[inline]
    pub fn positional_count(&self) -> usize {
        self.argument_count - self.argument_names.len()
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Args{}", self.argument_count)?;
        if !self.argument_names.is_empty() {
            f.write_str("(")?;
            for (i, name) in self.argument_names.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

// =============================================================================
// Member Keys
// =============================================================================

/// Key of get-member and set-member binders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub name: Arc<str>,
    pub ignore_case: bool,
}

impl MemberKey {
    pub fn new(name: impl Into<Arc<str>>, ignore_case: bool) -> Self {
        Self {
            name: name.into(),
            ignore_case,
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.ignore_case {
            f.write_str(" (ignore case)")?;
        }
        Ok(())
    }
}

/// Key of invoke-member binders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvokeMemberKey {
    pub member: MemberKey,
    pub call: CallShape,
}

impl fmt::Display for InvokeMemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.member, self.call.argument_count())
    }
}

// =============================================================================
// Operator Keys
// =============================================================================

/// Key of binary-operator binders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinaryKey {
    pub operator: BinaryOperator,
    pub integer_division: bool,
}

impl BinaryKey {
    /// Normalize a requested operator: `IntegerDivide` is stored as
    /// `Divide` with the integer-division flag set, and the flag is cleared
    /// for every other operator since only `/` reads it.
    pub fn new(operator: BinaryOperator, integer_division: bool) -> Self {
        match operator {
            BinaryOperator::IntegerDivide => Self {
                operator: BinaryOperator::Divide,
                integer_division: true,
            },
            BinaryOperator::Divide => Self {
                operator,
                integer_division,
            },
            operator => Self {
                operator,
                integer_division: false,
            },
        }
    }
}

impl fmt::Display for BinaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator)?;
        if self.integer_division {
            f.write_str(" (integer)")?;
        }
        Ok(())
    }
}

/// Key of unary-operator binders.
pub type UnaryKey = UnaryOperator;
