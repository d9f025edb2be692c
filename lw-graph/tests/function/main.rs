mod extension;
mod infer;
