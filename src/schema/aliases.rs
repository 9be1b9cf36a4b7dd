// src/schema/aliases.rs

//! Built-in alias tables, one block per export tool.

use super::ColumnSpec;

/// TikTok scrape (Apify actor export).
pub mod tiktok {
    use super::ColumnSpec;

    /// ISO timestamp text, parsed as-is.
    pub const TIMESTAMP_ISO: ColumnSpec = ColumnSpec::exact("timestamp", &["createTimeISO"]);
    /// Unix seconds.
    pub const TIMESTAMP_EPOCH: ColumnSpec = ColumnSpec::exact("timestamp", &["createTime"]);
    pub const TEXT: ColumnSpec = ColumnSpec::exact("text", &["text", "desc", "description"]);
    pub const VIEWS: ColumnSpec = ColumnSpec::exact("views", &["playCount", "plays", "views"]);
    pub const LIKES: ColumnSpec = ColumnSpec::exact("likes", &["diggCount", "likes"]);
    pub const SHARES: ColumnSpec = ColumnSpec::exact("shares", &["shareCount", "shares"]);
    pub const COMMENTS: ColumnSpec = ColumnSpec::exact("comments", &["commentCount", "comments"]);
}

/// FastMoss influencer (KOC/KOL) list.
pub mod influencers {
    use super::ColumnSpec;

    pub const VIEWS: ColumnSpec = ColumnSpec::exact("views", &["Lượt xem", "Views"]);
    pub const LIKES: ColumnSpec = ColumnSpec::exact(
        "likes",
        &["[90 ngày gần đây]Lượt thích", "Lượt thích", "Likes"],
    );
    pub const FOLLOWERS: ColumnSpec =
        ColumnSpec::exact("followers", &["Lượt theo dõi", "Followers"]);
    pub const POSTED_AT: ColumnSpec =
        ColumnSpec::exact("posted_at", &["Thời gian đăng", "Ngày đăng", "Date"]);
    pub const CATEGORY: ColumnSpec =
        ColumnSpec::exact("category", &["Phân loại KOC/KOL", "KOC/KOL", "Category"]);
}

/// FastMoss shop workbook: video, livestream and product sheets.
pub mod fastmoss {
    use super::ColumnSpec;

    pub const VIDEO_SHEETS: &[&str] = &["Data Video", "Video", "Videos"];
    pub const LIVESTREAM_SHEETS: &[&str] = &["Data Livestream", "Livestream", "Live"];
    pub const PRODUCT_SHEETS: &[&str] = &[
        "Data Product ",
        "Data Product",
        "Product",
        "Products",
        "Sản phẩm",
        "Data Sản phẩm",
    ];

    pub const VIDEO_DATE: ColumnSpec =
        ColumnSpec::exact("video_date", &["Thời gian phát hành", "Ngày đăng", "Date"]);
    pub const LIVESTREAM_DATE: ColumnSpec = ColumnSpec::exact(
        "livestream_date",
        &["Thời gian bắt đầu Livestream", "Ngày", "Date"],
    );
    pub const VIEWS: ColumnSpec = ColumnSpec::exact("views", &["Lượt xem", "Views"]);
    pub const LIKES: ColumnSpec = ColumnSpec::exact("likes", &["Số lượng likes", "Likes"]);
    pub const VIDEO_REVENUE: ColumnSpec =
        ColumnSpec::exact("revenue", &["Doanh số bán hàng của video", "Doanh số"]);
    pub const LIVESTREAM_REVENUE: ColumnSpec =
        ColumnSpec::exact("revenue", &["Doanh số Livestream", "Doanh số"]);
    pub const PRODUCT_REVENUE: ColumnSpec = ColumnSpec::exact("revenue", &["Doanh số", "Revenue"]);

    /// Normalized revenue lands in this column next to the raw one.
    pub const REVENUE_VND: &str = "Doanh số (VND)";
}

/// Fanpage Karma page-engagement export.
pub mod fanpage {
    use super::ColumnSpec;

    pub const SHEETS: &[&str] = &["Metrics Overview"];

    pub const DATE: ColumnSpec = ColumnSpec::contains("date", &["date", "ngày", "time"]);
    pub const ENGAGEMENT: ColumnSpec =
        ColumnSpec::contains("engagement", &["engagement", "tương tác", "interact"]);
    pub const PROFILE: ColumnSpec = ColumnSpec::exact("profile", &["Profile", "Trang"]);
    pub const INTERACTION_RATE: ColumnSpec = ColumnSpec::exact(
        "interaction_rate",
        &["Post interaction rate", "Tỉ lệ tương tác bài viết"],
    );
}

/// Every `ColumnSpec` defined here.
#[cfg(test)]
pub(crate) fn all_specs() -> Vec<ColumnSpec> {
    vec![
        tiktok::TIMESTAMP_ISO,
        tiktok::TIMESTAMP_EPOCH,
        tiktok::TEXT,
        tiktok::VIEWS,
        tiktok::LIKES,
        tiktok::SHARES,
        tiktok::COMMENTS,
        influencers::VIEWS,
        influencers::LIKES,
        influencers::FOLLOWERS,
        influencers::POSTED_AT,
        influencers::CATEGORY,
        fastmoss::VIDEO_DATE,
        fastmoss::LIVESTREAM_DATE,
        fastmoss::VIEWS,
        fastmoss::LIKES,
        fastmoss::VIDEO_REVENUE,
        fastmoss::LIVESTREAM_REVENUE,
        fastmoss::PRODUCT_REVENUE,
        fanpage::DATE,
        fanpage::ENGAGEMENT,
        fanpage::PROFILE,
        fanpage::INTERACTION_RATE,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_sets_are_non_empty() {
        for spec in all_specs() {
            assert!(!spec.aliases.is_empty(), "{} has no aliases", spec.canonical);
            assert!(spec.aliases.iter().all(|a| !a.trim().is_empty()));
        }
    }
}
