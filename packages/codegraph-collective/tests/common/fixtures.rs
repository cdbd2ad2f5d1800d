//! Test fixture generators
//!
//! Each fixture builds a small module shaped like the C program in its doc
//! comment. Line numbers are the ones a reader of that program would see.

use super::builders::{Mpi, OpenMp};
use codegraph_collective::ir::{Linkage, Type, ValueId};
use codegraph_collective::{Module, ModuleBuilder};

/// A module and the collective call the test is about
pub struct Fixture {
    pub module: Module,
    pub collective: ValueId,
    /// Branch condition expected in the warning, if any
    pub condition: Option<ValueId>,
}

/// ```c
/// 3: MPI_Comm_rank(comm, &rank);
/// 4: MPI_Barrier(comm);
/// 5: MPI_Allreduce(&rank, &sum, 1, int, sum, comm);
/// ```
pub fn straight_line() -> Fixture {
    let mut mb = ModuleBuilder::new("straight").source_file("straight.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let collective = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let sum = b.alloca("sum");
        let zero = b.const_int(0);
        let one = b.const_int(1);
        b.at_line(3).call(mpi.comm_rank, &[zero, rank]);
        b.at_line(4).call(mpi.barrier, &[zero]);
        let reduce = b
            .at_line(5)
            .call(mpi.allreduce, &[rank, sum, one, zero, zero, zero]);
        b.at_line(6).ret(Some(zero));
        reduce
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: None,
    }
}

/// ```c
/// 3: MPI_Comm_rank(comm, &rank);
/// 4: int r = rank;
/// 5: if (r == 0)
/// 6:     MPI_Barrier(comm);
/// ```
pub fn rank_gated_barrier() -> Fixture {
    let mut mb = ModuleBuilder::new("rank_gated").source_file("rank_gated.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let (collective, cond) = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        b.at_line(3).call(mpi.comm_rank, &[zero, rank]);
        let r = b.at_line(4).load(Type::Int, rank);
        let cond = b.at_line(5).cmp(r, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        let barrier = b.at_line(6).call(mpi.barrier, &[zero]);
        b.br(join);
        b.switch_to(join);
        b.at_line(7).ret(Some(zero));
        (barrier, cond)
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// Same as [`rank_gated_barrier`] with the rank broadcast first
///
/// ```c
/// 3: MPI_Comm_rank(comm, &rank);
/// 4: MPI_Bcast(&rank, 1, int, 0, comm);
/// 5: if (rank == 0)
/// 6:     MPI_Barrier(comm);
/// ```
pub fn broadcast_rank() -> Fixture {
    let mut mb = ModuleBuilder::new("bcast").source_file("bcast.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let collective = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        let one = b.const_int(1);
        b.at_line(3).call(mpi.comm_rank, &[zero, rank]);
        b.at_line(4).call(mpi.bcast, &[rank, one, zero, zero, zero]);
        let r = b.at_line(5).load(Type::Int, rank);
        let cond = b.cmp(r, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        let barrier = b.at_line(6).call(mpi.barrier, &[zero]);
        b.br(join);
        b.switch_to(join);
        b.ret(Some(zero));
        barrier
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: None,
    }
}

/// ```c
/// 3: if (1 == 0)
/// 4:     MPI_Barrier(comm);
/// ```
pub fn constant_guard() -> Fixture {
    let mut mb = ModuleBuilder::new("constant").source_file("constant.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let collective = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        let one = b.const_int(1);
        b.at_line(2).call(mpi.comm_rank, &[zero, rank]);
        let cond = b.at_line(3).cmp(one, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        let barrier = b.at_line(4).call(mpi.barrier, &[zero]);
        b.br(join);
        b.switch_to(join);
        b.ret(Some(zero));
        barrier
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: None,
    }
}

/// Both branches of a rank test store the same literal
///
/// ```c
/// 3: MPI_Comm_rank(comm, &rank);
/// 4: if (rank == 0) x = 1;
/// 5: else           x = 1;
/// 6: if (x)
/// 7:     MPI_Barrier(comm);
/// ```
pub fn equal_literal_phi() -> Fixture {
    let mut mb = ModuleBuilder::new("phi").source_file("phi.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let (collective, cond) = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let x = b.alloca("x");
        let zero = b.const_int(0);
        let one = b.const_int(1);
        b.at_line(3).call(mpi.comm_rank, &[zero, rank]);
        let r = b.at_line(4).load(Type::Int, rank);
        let rank_cond = b.cmp(r, zero);
        let then = b.block("then");
        let other = b.block("else");
        let join = b.block("join");
        let sync = b.block("sync");
        let exit = b.block("exit");
        b.cond_br(rank_cond, then, other);
        b.switch_to(then);
        b.at_line(4).store(one, x);
        b.br(join);
        b.switch_to(other);
        b.at_line(5).store(one, x);
        b.br(join);
        b.switch_to(join);
        let value = b.at_line(6).load(Type::Int, x);
        let cond = b.cmp(value, zero);
        b.cond_br(cond, sync, exit);
        b.switch_to(sync);
        let barrier = b.at_line(7).call(mpi.barrier, &[zero]);
        b.br(exit);
        b.switch_to(exit);
        b.ret(Some(zero));
        (barrier, cond)
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// ```c
/// 3: int tid = omp_get_thread_num();
/// 4: if (tid == 0)
/// 5:     #pragma omp barrier
/// ```
pub fn openmp_thread_gated() -> Fixture {
    let mut mb = ModuleBuilder::new("omp").source_file("omp.c");
    let omp = OpenMp::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let (collective, cond) = {
        let mut b = mb.body(main);
        let zero = b.const_int(0);
        let null = b.null();
        let tid = b.at_line(3).call(omp.thread_num, &[]);
        let cond = b.at_line(4).cmp(tid, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        let barrier = b.at_line(5).call(omp.barrier, &[null, zero]);
        b.br(join);
        b.switch_to(join);
        b.ret(Some(zero));
        (barrier, cond)
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// Recursion depth depends on the rank
///
/// ```c
///  3: static void step(int n) {
///  4:     if (n > 0)
///  5:         step(n - 1);
///  6:     MPI_Barrier(comm);
///  7: }
/// 10: MPI_Comm_rank(comm, &rank);
/// 11: step(rank);
/// ```
pub fn recursion() -> Fixture {
    let mut mb = ModuleBuilder::new("recursion").source_file("recursion.c");
    let mpi = Mpi::declare(&mut mb);
    let step = mb.define("step", &[Type::Int], Type::Void);
    mb.set_linkage(step, Linkage::Internal);
    let main = mb.define("main", &[], Type::Int);
    let (collective, cond) = {
        let mut b = mb.body(step);
        let n = b.param(0);
        let zero = b.const_int(0);
        let one = b.const_int(1);
        let cond = b.at_line(4).cmp(n, zero);
        let rec = b.block("rec");
        let done = b.block("done");
        b.cond_br(cond, rec, done);
        b.switch_to(rec);
        let next = b.at_line(5).binary(n, one);
        b.call(step, &[next]);
        b.br(done);
        b.switch_to(done);
        let barrier = b.at_line(6).call(mpi.barrier, &[zero]);
        b.at_line(7).ret(None);
        (barrier, cond)
    };
    {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        b.at_line(10).call(mpi.comm_rank, &[zero, rank]);
        let r = b.at_line(11).load(Type::Int, rank);
        b.call(step, &[r]);
        b.ret(Some(zero));
    }
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// The collective sits in a callee called under a rank test
///
/// ```c
/// 3: static void sync(void) { MPI_Barrier(comm); }
/// 6: MPI_Comm_rank(comm, &rank);
/// 7: if (rank == 0)
/// 8:     sync();
/// ```
pub fn callee_gated() -> Fixture {
    let mut mb = ModuleBuilder::new("callee").source_file("callee.c");
    let mpi = Mpi::declare(&mut mb);
    let sync = mb.define("sync", &[], Type::Void);
    mb.set_linkage(sync, Linkage::Internal);
    let main = mb.define("main", &[], Type::Int);
    let collective = {
        let mut b = mb.body(sync);
        let zero = b.const_int(0);
        let barrier = b.at_line(3).call(mpi.barrier, &[zero]);
        b.ret(None);
        barrier
    };
    let cond = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        b.at_line(6).call(mpi.comm_rank, &[zero, rank]);
        let r = b.at_line(7).load(Type::Int, rank);
        let cond = b.cmp(r, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        b.at_line(8).call(sync, &[]);
        b.br(join);
        b.switch_to(join);
        b.ret(Some(zero));
        cond
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// ```c
/// 3: for (i = 0; i < n; i++)
/// 4:     MPI_Allreduce(&i, &sum, 1, int, sum, comm);
/// ```
pub fn loop_collective() -> Fixture {
    let mut mb = ModuleBuilder::new("loop").source_file("loop.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[Type::Int], Type::Int);
    let collective = {
        let mut b = mb.body(main);
        let n = b.param(0);
        let i = b.alloca("i");
        let sum = b.alloca("sum");
        let zero = b.const_int(0);
        let one = b.const_int(1);
        b.store(zero, i);
        let header = b.block("header");
        let body = b.block("body");
        let exit = b.block("exit");
        b.br(header);
        b.switch_to(header);
        let iv = b.at_line(3).load(Type::Int, i);
        let cond = b.cmp(iv, n);
        b.cond_br(cond, body, exit);
        b.switch_to(body);
        let reduce = b
            .at_line(4)
            .call(mpi.allreduce, &[i, sum, one, zero, zero, zero]);
        let next = b.binary(iv, one);
        b.store(next, i);
        b.br(header);
        b.switch_to(exit);
        b.ret(Some(zero));
        reduce
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: None,
    }
}

/// ```c
/// 3: MPI_Comm_rank(comm, &rank);
/// 4: switch (rank) {
/// 5: case 0: MPI_Barrier(comm);
/// 6: }
/// ```
pub fn switch_gated() -> Fixture {
    let mut mb = ModuleBuilder::new("switch").source_file("switch.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let (collective, cond) = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        b.at_line(3).call(mpi.comm_rank, &[zero, rank]);
        let r = b.at_line(4).load(Type::Int, rank);
        let case0 = b.block("case0");
        let join = b.block("join");
        b.switch(r, join, &[case0]);
        b.switch_to(case0);
        let barrier = b.at_line(5).call(mpi.barrier, &[zero]);
        b.br(join);
        b.switch_to(join);
        b.at_line(6).ret(Some(zero));
        (barrier, r)
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// The barrier is only ever called through a function pointer
///
/// ```c
/// 3: int (*sync)(MPI_Comm) = MPI_Barrier;
/// 4: MPI_Comm_rank(comm, &rank);
/// 5: if (rank == 0)
/// 6:     sync(comm);
/// ```
pub fn indirect_barrier() -> Fixture {
    let mut mb = ModuleBuilder::new("indirect").source_file("indirect.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let barrier_value = mb.function_value(mpi.barrier);
    let (collective, cond) = {
        let mut b = mb.body(main);
        let slot = b.alloca("sync");
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        b.at_line(3).store(barrier_value, slot);
        b.at_line(4).call(mpi.comm_rank, &[zero, rank]);
        let r = b.at_line(5).load(Type::Int, rank);
        let cond = b.cmp(r, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        let fp = b.at_line(6).load(Type::Ptr, slot);
        let call = b.call_indirect(fp, &[zero], Type::Int);
        b.br(join);
        b.switch_to(join);
        b.ret(Some(zero));
        (call, cond)
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// The rank reaches the guard only through `memcpy`
///
/// ```c
/// 3: MPI_Comm_rank(comm, &rank);
/// 4: memcpy(&copy, &rank, sizeof rank);
/// 5: if (copy == 0)
/// 6:     MPI_Barrier(comm);
/// ```
pub fn memcpy_laundered_rank() -> Fixture {
    let mut mb = ModuleBuilder::new("memcpy").source_file("memcpy.c");
    let mpi = Mpi::declare(&mut mb);
    let memcpy = mb.declare("memcpy", &[Type::Ptr, Type::Ptr, Type::Int], Type::Ptr);
    let main = mb.define("main", &[], Type::Int);
    let (collective, cond) = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let copy = b.alloca("copy");
        let zero = b.const_int(0);
        let four = b.const_int(4);
        b.at_line(3).call(mpi.comm_rank, &[zero, rank]);
        b.at_line(4).call(memcpy, &[copy, rank, four]);
        let c = b.at_line(5).load(Type::Int, copy);
        let cond = b.cmp(c, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        let barrier = b.at_line(6).call(mpi.barrier, &[zero]);
        b.br(join);
        b.switch_to(join);
        b.ret(Some(zero));
        (barrier, cond)
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}

/// A rank-gated barrier in a function nothing calls
///
/// ```c
/// 3: void unused(void) {
/// 4:     MPI_Comm_rank(comm, &rank);
/// 5:     if (rank == 0)
/// 6:         MPI_Barrier(comm);
/// 7: }
/// 9: int main(void) { MPI_Barrier(comm); }
/// ```
pub fn dead_function() -> Fixture {
    let mut mb = ModuleBuilder::new("dead").source_file("dead.c");
    let mpi = Mpi::declare(&mut mb);
    let unused = mb.define("unused", &[], Type::Void);
    let main = mb.define("main", &[], Type::Int);
    let collective = {
        let mut b = mb.body(unused);
        let rank = b.alloca("rank");
        let zero = b.const_int(0);
        b.at_line(4).call(mpi.comm_rank, &[zero, rank]);
        let r = b.at_line(5).load(Type::Int, rank);
        let cond = b.cmp(r, zero);
        let then = b.block("then");
        let join = b.block("join");
        b.cond_br(cond, then, join);
        b.switch_to(then);
        let barrier = b.at_line(6).call(mpi.barrier, &[zero]);
        b.br(join);
        b.switch_to(join);
        b.at_line(7).ret(None);
        barrier
    };
    {
        let mut b = mb.body(main);
        let zero = b.const_int(0);
        b.at_line(9).call(mpi.barrier, &[zero]);
        b.ret(Some(zero));
    }
    Fixture {
        module: mb.finish(),
        collective,
        condition: None,
    }
}

/// Both branches synchronize `world`; only one synchronizes `sub`
///
/// ```c
/// 3: MPI_Comm_rank(world, &rank);
/// 4: if (rank == 0) {
/// 5:     MPI_Barrier(world);
/// 6:     MPI_Barrier(sub);
/// 7: } else {
/// 8:     MPI_Barrier(world);
/// 9: }
/// ```
///
/// `collective` is the barrier on `sub`.
pub fn two_communicators() -> Fixture {
    let mut mb = ModuleBuilder::new("comms").source_file("comms.c");
    let mpi = Mpi::declare(&mut mb);
    let main = mb.define("main", &[], Type::Int);
    let (collective, cond) = {
        let mut b = mb.body(main);
        let rank = b.alloca("rank");
        let world = b.const_int(0);
        let sub = b.const_int(1);
        b.at_line(3).call(mpi.comm_rank, &[world, rank]);
        let r = b.at_line(4).load(Type::Int, rank);
        let cond = b.cmp(r, world);
        let then = b.block("then");
        let other = b.block("else");
        let join = b.block("join");
        b.cond_br(cond, then, other);
        b.switch_to(then);
        b.at_line(5).call(mpi.barrier, &[world]);
        let on_sub = b.at_line(6).call(mpi.barrier, &[sub]);
        b.br(join);
        b.switch_to(other);
        b.at_line(8).call(mpi.barrier, &[world]);
        b.br(join);
        b.switch_to(join);
        b.ret(Some(world));
        (on_sub, cond)
    };
    Fixture {
        module: mb.finish(),
        collective,
        condition: Some(cond),
    }
}
