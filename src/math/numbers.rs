// This holds traits that are used throughout the crate
// to make things easy for us:

use num_traits;

// This is our own float trait versus the num_traits' one:

pub trait Float: num_traits::Float {
    const PI: Self;
    const INV_PI: Self;
    const ONE_MINUS_EPS: Self;

    // These could be constants, but to mimick the design of num_traits' float
    // we'll make them functions:
    fn two() -> Self;
    fn half() -> Self;
}

impl Float for f32 {
    const PI: Self = 3.14159265358979323846;
    const INV_PI: Self = 0.31830988618379067154;
    const ONE_MINUS_EPS: Self = 0.99999994;

    fn two() -> Self {
        2f32
    }

    fn half() -> Self {
        0.5f32
    }
}

impl Float for f64 {
    const PI: Self = 3.14159265358979323846;
    const INV_PI: Self = 0.31830988618379067154;
    const ONE_MINUS_EPS: Self = 0.99999999999999989;

    fn two() -> Self {
        2f64
    }

    fn half() -> Self {
        0.5f64
    }
}
