//! Lock-free SPSC command ring between the control side and the render graph.
//!
//! Uses `ringbuf::HeapRb<GraphCommand>`: `try_pop` on the consumer half is
//! wait-free and allocation-free, so the render callback can drain it every
//! block. The producer half lives behind a mutex on the (non-real-time)
//! control side, where the engine and the chirp timer thread share it.

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

use crate::audio::graph::GraphCommand;

/// Producer half, held by the control side.
pub type CommandProducer = ringbuf::HeapProd<GraphCommand>;

/// Consumer half, held by the render graph.
pub type CommandConsumer = ringbuf::HeapCons<GraphCommand>;

/// Commands are drained every block and chirps are seconds apart; 64 slots
/// leave ample headroom for a stalled device.
pub const COMMAND_CAPACITY: usize = 64;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_command_ring() -> (CommandProducer, CommandConsumer) {
    HeapRb::<GraphCommand>::new(COMMAND_CAPACITY).split()
}
