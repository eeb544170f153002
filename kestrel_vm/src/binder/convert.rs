//! Convert binder.
//!
//! Nil converts without consulting the resolver:
//!
//! | destination | result                          |
//! |-------------|---------------------------------|
//! | `result`    | the runtime's empty result      |
//! | `string`    | the runtime's empty text        |
//! | other       | the destination's default value |

use std::sync::Arc;

use kestrel_runtime::{Fragment, Guard, GuardedFragment, HostType, OperandDescriptor};

use super::{Binding, BinderStats, Deferral, TARGET};
use crate::context::RuntimeContext;
use crate::error_fragment;

/// Binds conversion of one operand to a fixed destination type.
#[derive(Debug)]
pub struct ConvertBinder {
    context: Arc<RuntimeContext>,
    destination: HostType,
    stats: BinderStats,
}

impl ConvertBinder {
    pub fn new(context: Arc<RuntimeContext>, destination: HostType) -> Self {
        Self {
            context,
            destination,
            stats: BinderStats::default(),
        }
    }

    #[inline]
    pub fn destination(&self) -> &HostType {
        &self.destination
    }

    #[inline]
    pub fn stats(&self) -> &BinderStats {
        &self.stats
    }

    pub fn bind(&self, target: &OperandDescriptor, fallback: Option<GuardedFragment>) -> Binding {
        if let Some(deferral) = Deferral::collect([target]) {
            return self.stats.deferred(deferral);
        }

        if target.is_nil() {
            return self
                .stats
                .bound(GuardedFragment::new(self.convert_nil(), Guard::is_nil(TARGET)));
        }

        let guard = Guard::type_is(TARGET, target.limit_type());
        let source = target.fragment(TARGET);
        let rule = if source.result_type() == &self.destination || self.destination.is_object() {
            GuardedFragment::new(source, guard)
        } else {
            match self.context.resolver().try_convert(&source, &self.destination) {
                Ok(fragment) => GuardedFragment::new(fragment.coerce(self.destination.clone()), guard),
                Err(error) => error_fragment::from_resolve_error(error, fallback, &self.destination, guard),
            }
        };
        self.stats.bound(rule)
    }

    fn convert_nil(&self) -> Fragment {
        if self.destination == HostType::result() {
            self.context.empty_result_fragment()
        } else if self.destination == HostType::text() {
            self.context.empty_text_fragment()
        } else {
            Fragment::default(self.destination.clone())
        }
    }
}
