// aiec — AIE core-to-standard lowering and copy removal
//
// Library root. Leaf modules first: ids and the program representation,
// then the architecture table, topology index and intrinsic catalogue, then
// the two passes and the runner that sequences them.

pub mod arch;
pub mod builder;
pub mod copy_removal;
pub mod diag;
pub mod id;
pub mod intrinsics;
pub mod ir;
pub mod lower;
pub mod pass;
pub mod pipeline;
pub mod print;
pub mod topology;
