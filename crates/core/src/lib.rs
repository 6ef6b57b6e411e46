//! Deepfake detection pipeline.
//!
//! Media is sampled into frames, each frame is reduced to a normalized set of
//! facial landmarks, the per-frame vectors are summarized over time, and a
//! pretrained projection + decision forest labels the input `REAL` or
//! `DEEPFAKE`.

pub mod shared {
    pub mod config;
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod media_input;
    pub mod media_metadata;
    pub mod model_resolver;
}

pub mod video {
    pub mod domain {
        pub mod video_reader;
    }
    pub mod infrastructure;
}

pub mod sampling {
    pub mod frame_sampler;
}

pub mod detection {
    pub mod domain {
        pub mod landmark_detector;
        pub mod landmark_set;
    }
    pub mod infrastructure;
}

pub mod features {
    pub mod aggregator;
    pub mod normalizer;
}

pub mod model {
    pub mod linear_projection;
    pub mod prediction;
    pub mod pretrained_model;
    pub mod random_forest;
}

pub mod pipeline {
    pub mod pipeline_logger;
    pub mod predict_media_use_case;
}

#[cfg(test)]
mod test_support;
