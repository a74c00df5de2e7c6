use std::fmt::Debug;

use num_traits::Num;

/// Make sure bounds are ordered correctly, eg the end of an interval is not before its start.
///
pub fn rearrange<N>(lower: N, upper: N) -> (N, N)
where
    N: Num + Debug + PartialOrd,
{
    if lower > upper {
        (upper, lower)
    } else {
        (lower, upper)
    }
}
