//! Small heap for crates that link `alloc`.
//!
//! Staging never allocates; `lz4_flex` only needs an allocator to exist.

use linked_list_allocator::LockedHeap;

const HEAP_SIZE: usize = 4 * 1024;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

static mut HEAP: [u8; HEAP_SIZE] = [0; HEAP_SIZE];

pub fn init() {
    // SAFETY: called once before anything could allocate; HEAP is not
    // referenced anywhere else.
    unsafe {
        ALLOCATOR
            .lock()
            .init(core::ptr::addr_of_mut!(HEAP).cast::<u8>(), HEAP_SIZE);
    }
}
