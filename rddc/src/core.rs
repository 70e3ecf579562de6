pub mod task;

pub mod capture;

pub mod transport;

pub mod context;

pub mod rdd;

pub mod partitioner;

pub mod split;

pub mod executor;
