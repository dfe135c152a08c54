mod admission;
mod cli;
mod concurrency;
mod corruption;
mod healing;
mod scenario;
