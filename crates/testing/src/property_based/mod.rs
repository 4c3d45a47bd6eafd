//! Property-based checks over `sis-kernel` invariants that hold for whole
//! classes of inputs, not just the hand-picked scenario numbers.
