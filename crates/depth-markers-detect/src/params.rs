use serde::{Deserialize, Serialize};

use crate::corners::CornerParams;
use crate::decode::DecoderParams;
use crate::links::LinkParams;
use crate::threshold::ThresholdParams;

/// Configuration of detection stages 1-7.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectParams {
    /// Black/white classification of the color frame.
    pub threshold: ThresholdParams,
    /// Arm walk and corner acceptance.
    pub corners: CornerParams,
    /// Corner-to-corner link resolution.
    pub links: LinkParams,
    /// Quad validation.
    pub decoder: DecoderParams,
}
