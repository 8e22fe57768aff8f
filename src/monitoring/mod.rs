/*!
 * Monitoring
 * Tracing setup and spans for asset loads
 */

mod tracer;

pub use tracer::{init_tracing, span_load, LoadSpan};
