//! Integration tests driving the simulators over hand-assembled ATNs.

mod support;

mod context_tests;
