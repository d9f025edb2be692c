mod batch;
mod convert;
mod wrapper;
