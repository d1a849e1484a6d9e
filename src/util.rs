/// Checks that a numerical value is in the provided interval and returns an
/// [`Error::InvalidConfiguration`](crate::Error::InvalidConfiguration) with a helpful message if not
///
/// Write `check_interval!(value, 0.0, 1.0)` for the closed interval `[0,1]` and
/// `check_interval!(value, > 0.0, 1.0)` for the half-open interval `(0,1]`.
///
/// ### Example
/// ```ignore
/// let alpha = 2.0;
/// check_interval!(alpha, > 0.0, 1.0);
/// ```
/// This returns early with the message "invalid value for \`alpha\`: 2 is outside (0, 1]".
#[macro_export]
macro_rules! check_interval {
    ($var:expr, > $a:expr, $b:expr) => {
        if !($var > $a && $var <= $b) {
            return Err($crate::Error::InvalidConfiguration(format!(
                "invalid value for `{}`: {} is outside ({}, {}]",
                stringify!($var),
                $var,
                $a,
                $b,
            )));
        }
    };
    ($var:expr, $a:expr, $b:expr) => {
        if !($var >= $a && $var <= $b) {
            return Err($crate::Error::InvalidConfiguration(format!(
                "invalid value for `{}`: {} is outside [{}, {}]",
                stringify!($var),
                $var,
                $a,
                $b,
            )));
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Error, Result};

    fn closed(value: f32) -> Result<()> {
        check_interval!(value, 0.0, 1.0);
        Ok(())
    }

    fn half_open(value: f32) -> Result<()> {
        check_interval!(value, > 0.0, 1.0);
        Ok(())
    }

    #[test]
    fn closed_interval() {
        assert!(closed(0.0).is_ok());
        assert!(closed(1.0).is_ok());
        assert!(closed(-0.1).is_err());
        assert!(closed(f32::NAN).is_err(), "NaN is never in range");
    }

    #[test]
    fn half_open_interval() {
        assert!(half_open(0.0).is_err());
        assert!(half_open(1.0).is_ok());
        match half_open(1.5) {
            Err(Error::InvalidConfiguration(msg)) => {
                assert_eq!(msg, "invalid value for `value`: 1.5 is outside (0, 1]")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
