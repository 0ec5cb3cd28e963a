pub mod product;
pub mod price_series;
pub mod sqlite_store;
pub mod statistics;
pub mod analytics;
pub mod discounts;
pub mod comparison;
pub mod export;
pub mod tracker;

#[cfg(test)]
mod integration_tests;

pub use product::{validate_product_name, ProductNameError, ProductRecord};
pub use price_series::{InMemoryPriceStore, PricePoint, PriceStore, StoreError};
pub use sqlite_store::{SqlitePriceStore, StoreInfo};
pub use statistics::PriceStatistics;
pub use analytics::{
    classify_volatility, AnalyticsError, Confidence, CrossoverSignal, MovingAverageReport,
    MovingAverageSeries, PredictedPoint, PredictionReport, SeasonalBucket, SeasonalReport,
    TrendAnalytics, TrendDirection, VolatilityLevel, VolatilityReport, DEFAULT_FORECAST_DAYS,
    DEFAULT_MOVING_AVERAGE_WINDOWS, DEFAULT_VOLATILITY_WINDOW_DAYS,
};
pub use discounts::{
    BestDiscountReport, DiscountReport, DiscountTracker, PriceDropEvent, DEFAULT_DROP_WINDOW_DAYS,
};
pub use comparison::{
    BuyRecommendation, BuyTimingReport, ComparisonSummary, Deal, PriceComparer, PriceTrend,
    ProductComparison, ProductSnapshot, TrendSummary, WeekdayPattern,
    DEFAULT_COMPARISON_WINDOW_DAYS, DEFAULT_MIN_DISCOUNT_PERCENT,
};
pub use export::{
    export_history_csv, export_history_json, import_history_csv, ExportError, HistoryDocument,
    HistoryRow,
};
pub use tracker::{CycleOutcome, DropNotifier, PriceFetcher, Tracker, TrackerConfig};
