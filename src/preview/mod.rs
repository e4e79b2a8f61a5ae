// Preview: the capture session lifecycle and the sinks processed frames go to.

pub mod capture;
pub mod sink;
